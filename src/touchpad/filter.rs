//! Exponential smoothing of per-tick touch deltas.

use std::ops::{Add, Mul, Sub};

/// Two-component delta or velocity in normalized touch units (or pixels once scaled).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// One step of an exponential moving average.
///
/// `factor` is the weight of the new sample; at `1.0` the raw value passes through.
pub fn smooth(previous: f32, raw: f32, factor: f32) -> f32 {
    factor * raw + (1.0 - factor) * previous
}

/// EMA memory for one motion channel (cursor or scroll).
#[derive(Clone, Debug)]
pub struct MotionFilter {
    factor: f32,
    smoothed: Vec2,
}

impl MotionFilter {
    /// Factors outside (0, 1] are clamped into range.
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.clamp(f32::EPSILON, 1.0),
            smoothed: Vec2::ZERO,
        }
    }

    pub fn update(&mut self, raw: Vec2) -> Vec2 {
        self.smoothed = Vec2::new(
            smooth(self.smoothed.x, raw.x, self.factor),
            smooth(self.smoothed.y, raw.y, self.factor),
        );
        self.smoothed
    }

    #[cfg(test)]
    pub fn smoothed(&self) -> Vec2 {
        self.smoothed
    }

    #[cfg(test)]
    /// Magnitude of the smoothed delta, used as velocity by the acceleration curve.
    pub fn velocity(&self) -> f32 {
        self.smoothed.length()
    }

    /// Share of the previous value kept by each update.
    pub fn retention(&self) -> f32 {
        1.0 - self.factor
    }

    #[cfg(test)]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn reset(&mut self) {
        self.smoothed = Vec2::ZERO;
    }
}
