//! Touchpad-to-pointer translation engine
//!
//! One [`TouchpadEngine::sample_tick`] call processes exactly one [`TouchSample`]:
//!
//! ```text
//! button edge ──► left click
//! new contact ──► cancel momentum
//! classifier  ──► raw delta ──► MotionFilter ──► AccelerationCurve ──► SubPixelAccumulator ──► PointerOutput
//! two-finger lift ──► Momentum (driven by momentum_tick)
//! ```
//!
//! The engine is synchronous and owns all gesture state. Timing comes in as explicit
//! `Instant`s, so the same sample sequence always yields the same output sequence.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::accumulator::SubPixelAccumulator;
use super::curve::AccelerationCurve;
use super::filter::{MotionFilter, Vec2};
use super::gesture::{ContactKind, GestureAction, GestureClassifier, GestureState};
use super::momentum::Momentum;
use crate::config::{ChannelTuning, EngineTuning, TouchpadSettings};
use crate::controller::{HapticFeedback, TouchSample};
use crate::output::{InputBackend, MouseButton, OutputCounters, PointerOutput};

/// Filter, curve and accumulator for one kind of motion.
#[derive(Debug, Clone)]
struct MotionChannel {
    filter: MotionFilter,
    curve: AccelerationCurve,
    accumulator: SubPixelAccumulator,
    base_scale: f32,
}

impl MotionChannel {
    fn new(tuning: &ChannelTuning) -> Self {
        Self {
            filter: MotionFilter::new(tuning.smoothing),
            curve: AccelerationCurve::new(tuning.curve),
            accumulator: SubPixelAccumulator::new(),
            base_scale: tuning.base_scale,
        }
    }

    /// Returns the scaled delta and any whole units ready for emission.
    fn process(&mut self, raw: Vec2, scalar: f32, exponent: f32) -> (Vec2, Option<(i32, i32)>) {
        let smoothed = self.filter.update(raw);
        let scaled = self.curve.scale(smoothed, self.base_scale, scalar, exponent);
        (scaled, self.accumulator.push(scaled))
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.curve.reset();
        self.accumulator.reset();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub ticks: u64,
    pub momentum_ticks: u64,
    pub output: OutputCounters,
}

pub struct TouchpadEngine {
    tuning: EngineTuning,
    classifier: GestureClassifier,
    cursor: MotionChannel,
    scroll: MotionChannel,
    /// Last scaled scroll delta, in pixels per tick; seeds momentum on release.
    scroll_velocity: Vec2,
    momentum: Option<Momentum>,
    button_was_pressed: bool,
    output: PointerOutput,
    haptics: Arc<dyn HapticFeedback>,
    haptics_reprepared: bool,
    ticks: u64,
    momentum_ticks: u64,
}

impl TouchpadEngine {
    pub fn new(
        tuning: EngineTuning,
        backend: Arc<dyn InputBackend>,
        haptics: Arc<dyn HapticFeedback>,
    ) -> Self {
        Self {
            classifier: GestureClassifier::new(tuning.gesture),
            cursor: MotionChannel::new(&tuning.cursor),
            scroll: MotionChannel::new(&tuning.scroll.channel()),
            scroll_velocity: Vec2::ZERO,
            momentum: None,
            button_was_pressed: false,
            output: PointerOutput::new(backend, tuning.output.click_hold()),
            haptics,
            haptics_reprepared: false,
            ticks: 0,
            momentum_ticks: 0,
            tuning,
        }
    }

    pub fn gesture(&self) -> GestureState {
        self.classifier.state()
    }

    /// A gesture is in progress or momentum is still scrolling.
    pub fn is_active(&self) -> bool {
        !self.classifier.is_idle() || self.momentum.is_some()
    }

    pub fn momentum_active(&self) -> bool {
        self.momentum.is_some()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            ticks: self.ticks,
            momentum_ticks: self.momentum_ticks,
            output: self.output.counters(),
        }
    }

    /// Processes one sampling tick. `sample` is `None` when the controller had no data.
    pub fn sample_tick(
        &mut self,
        sample: Option<TouchSample>,
        settings: TouchpadSettings,
        now: Instant,
    ) {
        self.ticks += 1;
        let settings = settings.sanitized();

        let Some(sample) = sample else {
            if !self.classifier.is_idle() {
                debug!("No touch data from controller, ending gesture");
            }
            self.classifier.reset();
            self.end_gesture();
            self.button_was_pressed = false;
            return;
        };

        if sample.button_pressed && !self.button_was_pressed {
            self.click(MouseButton::Left, now);
        }
        self.button_was_pressed = sample.button_pressed;

        // Only a fresh contact cancels momentum, not a finger left down after a two-finger lift.
        let eps = self.tuning.gesture.touch_epsilon;
        if self.classifier.is_idle()
            && (sample.primary.is_touching(eps) || sample.secondary.is_touching(eps))
        {
            self.cancel_momentum();
        }

        match self.classifier.classify(&sample, now) {
            GestureAction::None | GestureAction::TapPending => {}

            GestureAction::Began(ContactKind::OneFinger) => self.cursor.reset(),

            GestureAction::Began(ContactKind::TwoFinger) => {
                self.cancel_momentum();
                self.cursor.reset();
                self.scroll.reset();
                self.scroll_velocity = Vec2::ZERO;
            }

            GestureAction::Pointer(raw) => {
                let (_, emit) = self
                    .cursor
                    .process(raw, settings.sensitivity, settings.acceleration);
                if let Some((dx, dy)) = emit {
                    self.output.move_by(dx, dy);
                }
            }

            GestureAction::RightClick => {
                info!("Two-finger tap detected");
                self.click(MouseButton::Right, now);
            }

            GestureAction::Scroll(raw) => {
                self.cancel_momentum();
                let (scaled, emit) =
                    self.scroll
                        .process(raw, settings.scroll_speed, self.tuning.scroll.exponent);
                self.scroll_velocity = scaled;
                if let Some((dx, dy)) = emit {
                    self.output.scroll_by(dx, dy);
                }
            }

            GestureAction::Hold => {
                self.scroll.filter.update(Vec2::ZERO);
                self.scroll_velocity = self.scroll_velocity * self.scroll.filter.retention();
            }

            GestureAction::TwoFingerLifted { primary_remains } => {
                self.launch_momentum();
                self.end_gesture();
                if primary_remains {
                    debug!("Secondary finger lifted, continuing as one-finger drag");
                }
            }

            GestureAction::Lifted => self.end_gesture(),
        }
    }

    /// Emits one momentum scroll step, if momentum is running.
    pub fn momentum_tick(&mut self) {
        let Some(momentum) = self.momentum.as_mut() else {
            return;
        };
        self.momentum_ticks += 1;

        if let Some(Some((dx, dy))) = momentum.step_pixels() {
            self.output.scroll_by(dx, dy);
        }
        if momentum.is_spent() {
            debug!("Momentum settled");
            self.momentum = None;
        }
    }

    pub fn next_release_due(&self) -> Option<Instant> {
        self.output.next_release_due()
    }

    pub fn release_due(&mut self, now: Instant) {
        self.output.release_due(now);
    }

    /// Delivers pending button releases and discards all transient state.
    pub fn shutdown(&mut self) {
        self.output.release_all();
        self.classifier.reset();
        self.end_gesture();
        self.momentum = None;
        self.button_was_pressed = false;
    }

    fn end_gesture(&mut self) {
        self.cursor.reset();
        self.scroll.reset();
        self.scroll_velocity = Vec2::ZERO;
    }

    fn launch_momentum(&mut self) {
        self.momentum = Momentum::launch(self.scroll_velocity, self.tuning.momentum);
        if let Some(momentum) = &self.momentum {
            debug!("Momentum launched with velocity {:?}", momentum.velocity());
        }
    }

    fn cancel_momentum(&mut self) {
        if self.momentum.take().is_some() {
            debug!("Momentum cancelled by new touch");
        }
    }

    fn click(&mut self, button: MouseButton, now: Instant) {
        if !self.output.click(button, now) {
            return;
        }
        if let Err(e) = self.haptics.pulse() {
            debug!("Haptic pulse failed: {}", e);
            if !self.haptics_reprepared {
                self.haptics_reprepared = true;
                if let Err(e) = self.haptics.prepare() {
                    debug!("Haptic re-initialization failed: {}", e);
                }
            }
        }
    }
}
