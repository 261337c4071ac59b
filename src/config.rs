//! Configuration file model.
//!
//! One TOML file holds the user knobs (`[touchpad]`) and the engine tuning tables. Every
//! table defaults field by field, so a partial file is valid and a missing file is
//! replaced by the defaults on first start.

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::output::Bounds;
use crate::touchpad::curve::CurveParams;
use crate::touchpad::gesture::GestureTuning;
use crate::touchpad::momentum::MomentumParams;
use crate::touchpad::sampler::SamplerParams;

const APP_DIR: &str = "padmouse";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    #[error("{field} = {value} is outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{low} must be below {high}")]
    Inverted {
        low: &'static str,
        high: &'static str,
    },
}

/// The knobs a configuration surface may change at any time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchpadSettings {
    pub enabled: bool,
    /// 0.1 - 1.0
    pub sensitivity: f32,
    /// 0.0 - 1.0, exponent of the fast band of the cursor curve
    pub acceleration: f32,
    /// 0.1 - 1.0
    pub scroll_speed: f32,
}

impl TouchpadSettings {
    /// Copy with every knob clamped into its documented range.
    pub fn sanitized(self) -> Self {
        fn clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                fallback
            }
        }
        let defaults = Self::default();
        Self {
            enabled: self.enabled,
            sensitivity: clamp(self.sensitivity, 0.1, 1.0, defaults.sensitivity),
            acceleration: clamp(self.acceleration, 0.0, 1.0, defaults.acceleration),
            scroll_speed: clamp(self.scroll_speed, 0.1, 1.0, defaults.scroll_speed),
        }
    }
}

impl Default for TouchpadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: 0.5,
            acceleration: 0.25,
            scroll_speed: 0.5,
        }
    }
}

/// Smoothing and scaling for the cursor channel.
///
/// The fast-band exponent of the cursor curve is the live `acceleration` knob.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelTuning {
    /// EMA weight of the newest delta; 1.0 passes raw deltas through.
    pub smoothing: f32,
    pub base_scale: f32,
    pub curve: CurveParams,
}

impl Default for ChannelTuning {
    fn default() -> Self {
        Self {
            smoothing: 0.4,
            base_scale: 800.0,
            curve: CurveParams::cursor(),
        }
    }
}

/// Scroll channel tuning; unlike the cursor, its curve exponent is fixed here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollTuning {
    pub smoothing: f32,
    pub base_scale: f32,
    pub exponent: f32,
    pub curve: CurveParams,
}

impl ScrollTuning {
    pub fn channel(&self) -> ChannelTuning {
        ChannelTuning {
            smoothing: self.smoothing,
            base_scale: self.base_scale,
            curve: self.curve,
        }
    }
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            smoothing: 0.5,
            base_scale: 150.0,
            exponent: 0.5,
            curve: CurveParams::scroll(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputTuning {
    pub click_hold_ms: u64,
}

impl OutputTuning {
    pub fn click_hold(&self) -> Duration {
        Duration::from_millis(self.click_hold_ms)
    }
}

impl Default for OutputTuning {
    fn default() -> Self {
        Self { click_hold_ms: 10 }
    }
}

/// Everything the engine needs besides the live knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineTuning {
    pub gesture: GestureTuning,
    pub cursor: ChannelTuning,
    pub scroll: ScrollTuning,
    pub momentum: MomentumParams,
    pub sampler: SamplerParams,
    pub output: OutputTuning,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            gesture: GestureTuning::default(),
            cursor: ChannelTuning::default(),
            scroll: ScrollTuning::default(),
            momentum: MomentumParams::default(),
            sampler: SamplerParams::default(),
            output: OutputTuning::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub width: f64,
    pub height: f64,
}

impl DesktopConfig {
    pub fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width, self.height)
    }
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub touchpad: TouchpadSettings,
    pub gesture: GestureTuning,
    pub cursor: ChannelTuning,
    pub scroll: ScrollTuning,
    pub momentum: MomentumParams,
    pub sampler: SamplerParams,
    pub output: OutputTuning,
    pub desktop: DesktopConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let tuning = EngineTuning::default();
        Self {
            touchpad: TouchpadSettings::default(),
            gesture: tuning.gesture,
            cursor: tuning.cursor,
            scroll: tuning.scroll,
            momentum: tuning.momentum,
            sampler: tuning.sampler,
            output: tuning.output,
            desktop: DesktopConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn tuning(&self) -> EngineTuning {
        EngineTuning {
            gesture: self.gesture,
            cursor: self.cursor,
            scroll: self.scroll,
            momentum: self.momentum,
            sampler: self.sampler,
            output: self.output,
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| eyre!("No configuration directory on this platform"))?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Parses a possibly partial file. Keys absent from `text` keep the values of
    /// [`AppConfig::default`], including inside nested tables such as `[scroll.curve]`.
    pub fn parse(text: &str) -> Result<Self> {
        let overlay: toml::Table = text.parse().wrap_err("Invalid configuration file")?;
        let mut merged = toml::Value::try_from(Self::default())?;
        merge_tables(&mut merged, toml::Value::Table(overlay));
        let config: Self = merged
            .try_into()
            .wrap_err("Invalid configuration values")?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&text)?;
        info!("Loaded configuration from {}", path.display());
        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    /// Writes the default configuration to `path` unless a file already exists there.
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path).await? {
            debug!("Configuration file {} exists", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = toml::to_string_pretty(&Self::default())?;
        tokio::fs::write(path, text).await?;
        info!("Created default configuration at {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.tuning();

        for (field, value) in [
            ("touchpad.sensitivity", self.touchpad.sensitivity),
            ("touchpad.acceleration", self.touchpad.acceleration),
            ("touchpad.scroll_speed", self.touchpad.scroll_speed),
            ("gesture.touch_epsilon", t.gesture.touch_epsilon),
            ("gesture.tap_threshold", t.gesture.tap_threshold),
            ("cursor.base_scale", t.cursor.base_scale),
            ("scroll.base_scale", t.scroll.base_scale),
            ("scroll.exponent", t.scroll.exponent),
            ("momentum.threshold", t.momentum.threshold),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field });
            }
        }

        if !(t.momentum.threshold > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "momentum.threshold",
                value: t.momentum.threshold as f64,
                range: "(0, inf)",
            });
        }

        let (cursor, scroll) = (&t.cursor.curve, &t.scroll.curve);
        for (field, value) in [
            ("gesture.touch_epsilon", t.gesture.touch_epsilon),
            ("gesture.tap_threshold", t.gesture.tap_threshold),
            ("cursor.base_scale", t.cursor.base_scale),
            ("scroll.base_scale", t.scroll.base_scale),
            ("scroll.exponent", t.scroll.exponent),
            ("cursor.curve.low_breakpoint", cursor.low_breakpoint),
            ("cursor.curve.mid_breakpoint", cursor.mid_breakpoint),
            ("cursor.curve.linear_gain", cursor.linear_gain),
            ("cursor.curve.gain", cursor.gain),
            ("cursor.curve.precision_multiplier", cursor.precision_multiplier),
            ("cursor.curve.reduced_dampening", cursor.reduced_dampening),
            ("cursor.curve.slow_threshold", cursor.slow_threshold),
            ("scroll.curve.low_breakpoint", scroll.low_breakpoint),
            ("scroll.curve.mid_breakpoint", scroll.mid_breakpoint),
            ("scroll.curve.linear_gain", scroll.linear_gain),
            ("scroll.curve.gain", scroll.gain),
            ("scroll.curve.precision_multiplier", scroll.precision_multiplier),
            ("scroll.curve.reduced_dampening", scroll.reduced_dampening),
            ("scroll.curve.slow_threshold", scroll.slow_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value as f64,
                    range: "[0, inf)",
                });
            }
        }

        for (field, value) in [
            ("cursor.smoothing", t.cursor.smoothing),
            ("scroll.smoothing", t.scroll.smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value as f64,
                    range: "(0, 1]",
                });
            }
        }

        if !(t.momentum.decay > 0.0 && t.momentum.decay < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "momentum.decay",
                value: t.momentum.decay as f64,
                range: "(0, 1)",
            });
        }

        for (field, value) in [
            ("momentum.interval_ms", t.momentum.interval_ms),
            ("sampler.active_interval_ms", t.sampler.active_interval_ms),
            ("sampler.idle_interval_ms", t.sampler.idle_interval_ms),
            ("gesture.tap_window_ms", t.gesture.tap_window_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        for (low, high, curve) in [
            ("cursor.curve.low_breakpoint", "cursor.curve.mid_breakpoint", &t.cursor.curve),
            ("scroll.curve.low_breakpoint", "scroll.curve.mid_breakpoint", &t.scroll.curve),
        ] {
            if curve.low_breakpoint >= curve.mid_breakpoint {
                return Err(ConfigError::Inverted { low, high });
            }
        }

        if !(self.desktop.width > 0.0 && self.desktop.height > 0.0) {
            return Err(ConfigError::Zero {
                field: "desktop.width/height",
            });
        }

        Ok(())
    }
}

fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
