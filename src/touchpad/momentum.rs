//! Scroll momentum after a two-finger release.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::accumulator::SubPixelAccumulator;
use super::filter::Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    /// Speed in pixels per tick below which momentum does not start, or stops.
    pub threshold: f32,
    /// Per-tick velocity retention, in (0, 1).
    pub decay: f32,
    pub interval_ms: u64,
}

impl MomentumParams {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[cfg(test)]
    /// Upper bound on emitting ticks for a launch speed of `speed`.
    pub fn max_ticks(&self, speed: f32) -> u32 {
        if speed < self.threshold {
            return 0;
        }
        ((self.threshold / speed).ln() / self.decay.ln()).floor() as u32 + 1
    }
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            decay: 0.92,
            interval_ms: 16,
        }
    }
}

/// Decaying scroll velocity.
#[derive(Clone, Debug)]
pub struct Momentum {
    params: MomentumParams,
    velocity: Vec2,
    accumulator: SubPixelAccumulator,
}

impl Momentum {
    /// Starts momentum when `velocity` is faster than the threshold.
    pub fn launch(velocity: Vec2, params: MomentumParams) -> Option<Self> {
        if velocity.length() > params.threshold {
            Some(Self {
                params,
                velocity,
                accumulator: SubPixelAccumulator::new(),
            })
        } else {
            None
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_spent(&self) -> bool {
        self.velocity.length() < self.params.threshold
    }

    /// Returns this tick's scroll impulse and decays the velocity, or `None` once spent.
    pub fn step(&mut self) -> Option<Vec2> {
        if self.is_spent() {
            self.velocity = Vec2::ZERO;
            return None;
        }
        let impulse = self.velocity;
        self.velocity = self.velocity * self.params.decay;
        Some(impulse)
    }

    /// Like [`Momentum::step`], converted to whole scroll pixels.
    pub fn step_pixels(&mut self) -> Option<Option<(i32, i32)>> {
        self.step().map(|impulse| self.accumulator.push(impulse))
    }
}
