//! Velocity-dependent acceleration curve.
//!
//! Piecewise shape, by smoothed velocity `v`:
//!
//! ```text
//! v <  low  : precision_multiplier * dampening
//! v <  mid  : (1 + v * linear_gain) * dampening
//! v >= mid  : 1 + (v * gain)^exponent
//! ```
//!
//! `dampening` drops to `reduced_dampening` once the last `slow_ticks` ticks were all
//! below `slow_threshold`, which keeps resting fingers from producing micro-jitter.

use serde::{Deserialize, Serialize};

use super::filter::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    pub low_breakpoint: f32,
    pub mid_breakpoint: f32,
    pub linear_gain: f32,
    pub gain: f32,
    pub precision_multiplier: f32,
    pub reduced_dampening: f32,
    pub slow_threshold: f32,
    pub slow_ticks: u32,
}

impl CurveParams {
    pub fn cursor() -> Self {
        Self {
            low_breakpoint: 0.005,
            mid_breakpoint: 0.02,
            linear_gain: 20.0,
            gain: 15.0,
            precision_multiplier: 0.5,
            reduced_dampening: 0.25,
            slow_threshold: 0.003,
            slow_ticks: 6,
        }
    }

    pub fn scroll() -> Self {
        Self {
            low_breakpoint: 0.004,
            mid_breakpoint: 0.02,
            linear_gain: 10.0,
            gain: 12.0,
            precision_multiplier: 0.5,
            reduced_dampening: 0.25,
            slow_threshold: 0.002,
            slow_ticks: 6,
        }
    }
}

impl Default for CurveParams {
    fn default() -> Self {
        Self::cursor()
    }
}

#[derive(Clone, Debug)]
pub struct AccelerationCurve {
    params: CurveParams,
    slow_streak: u32,
}

impl AccelerationCurve {
    pub fn new(params: CurveParams) -> Self {
        Self {
            params,
            slow_streak: 0,
        }
    }

    /// Multiplier for the current tick. Also records the tick in the slow-movement history.
    pub fn multiplier(&mut self, velocity: f32, exponent: f32) -> f32 {
        let p = &self.params;
        if velocity < p.slow_threshold {
            self.slow_streak = self.slow_streak.saturating_add(1);
        } else {
            self.slow_streak = 0;
        }
        let dampening = self.dampening();

        if velocity < p.low_breakpoint {
            p.precision_multiplier * dampening
        } else if velocity < p.mid_breakpoint {
            (1.0 + velocity * p.linear_gain) * dampening
        } else {
            1.0 + (velocity * p.gain).powf(exponent)
        }
    }

    pub fn dampening(&self) -> f32 {
        if self.slow_streak >= self.params.slow_ticks {
            self.params.reduced_dampening
        } else {
            1.0
        }
    }

    /// `smoothed * multiplier * base_scale * scalar`, per axis.
    pub fn scale(&mut self, smoothed: Vec2, base_scale: f32, scalar: f32, exponent: f32) -> Vec2 {
        let multiplier = self.multiplier(smoothed.length(), exponent);
        smoothed * (multiplier * base_scale * scalar)
    }

    pub fn reset(&mut self) {
        self.slow_streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_mode_below_low_breakpoint() {
        let mut curve = AccelerationCurve::new(CurveParams::cursor());
        assert_eq!(curve.multiplier(0.004, 0.5), 0.5);
    }

    #[test]
    fn linear_band_scales_with_velocity() {
        let mut curve = AccelerationCurve::new(CurveParams::cursor());
        let m = curve.multiplier(0.01, 0.5);
        assert!((m - 1.2).abs() < 1e-6);
    }

    #[test]
    fn fast_band_is_superlinear_and_undamped() {
        let mut curve = AccelerationCurve::new(CurveParams::cursor());
        for _ in 0..20 {
            curve.multiplier(0.0, 1.0);
        }
        let m = curve.multiplier(0.04, 1.0);
        assert!((m - 1.6).abs() < 1e-5);
    }

    #[test]
    fn sustained_slow_movement_reduces_dampening() {
        let params = CurveParams::cursor();
        let mut curve = AccelerationCurve::new(params);
        for _ in 0..params.slow_ticks - 1 {
            assert_eq!(curve.multiplier(0.001, 0.5), 0.5);
        }
        assert_eq!(curve.multiplier(0.001, 0.5), 0.5 * 0.25);
        // one fast tick restores full dampening
        curve.multiplier(0.01, 0.5);
        assert_eq!(curve.dampening(), 1.0);
    }

    #[test]
    fn scale_applies_base_and_sensitivity() {
        let mut curve = AccelerationCurve::new(CurveParams::cursor());
        let out = curve.scale(Vec2::new(0.01, 0.0), 800.0, 0.5, 0.5);
        assert!((out.x - 0.01 * 1.2 * 400.0).abs() < 1e-3);
        assert_eq!(out.y, 0.0);
    }
}
