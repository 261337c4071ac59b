//! Touch samples and the controller-side collaborator contracts.

use serde::{Deserialize, Serialize};

use crate::touchpad::filter::Vec2;

/// Position of one finger channel, each axis normalized to [-1, 1].
///
/// A channel reports `(0, 0)` while no finger rests on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

impl TouchPoint {
    #[cfg(test)]
    pub const RELEASED: TouchPoint = TouchPoint { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// `|x| > epsilon || |y| > epsilon`
    pub fn is_touching(&self, epsilon: f32) -> bool {
        self.x.abs() > epsilon || self.y.abs() > epsilon
    }

    /// Displacement from `earlier` to `self`.
    pub fn delta_from(&self, earlier: TouchPoint) -> Vec2 {
        Vec2::new(self.x - earlier.x, self.y - earlier.y)
    }
}

impl From<(f32, f32)> for TouchPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Raw touchpad state read once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TouchSample {
    pub primary: TouchPoint,
    pub secondary: TouchPoint,
    pub button_pressed: bool,
}

impl TouchSample {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn one_finger(x: f32, y: f32) -> Self {
        Self {
            primary: TouchPoint::new(x, y),
            ..Self::default()
        }
    }

    pub fn two_fingers(primary: (f32, f32), secondary: (f32, f32)) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
            button_pressed: false,
        }
    }

    pub fn with_button(mut self, pressed: bool) -> Self {
        self.button_pressed = pressed;
        self
    }
}

/// Live handle to the controller's touchpad.
///
/// Implementations must answer without blocking; the tick loop polls once per tick.
pub trait TouchSource: Send + Sync {
    /// Whether a controller is currently attached.
    fn is_present(&self) -> bool;

    /// Latest touchpad state, or `None` when no controller data is available.
    fn poll(&self) -> Option<TouchSample>;
}

/// Authorization to inject system-wide input.
pub trait PermissionCheck: Send + Sync {
    fn is_authorized(&self) -> bool;
}

/// Fixed answer, for platforms without an authorization model.
#[derive(Clone, Copy, Debug)]
pub struct StaticPermission(pub bool);

impl PermissionCheck for StaticPermission {
    fn is_authorized(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_predicate_uses_epsilon() {
        assert!(!TouchPoint::new(0.0005, -0.0009).is_touching(0.001));
        assert!(TouchPoint::new(0.0, -0.0011).is_touching(0.001));
        assert!(!TouchPoint::RELEASED.is_touching(0.001));
    }

    #[test]
    fn delta_is_current_minus_earlier() {
        let d = TouchPoint::new(0.3, 0.1).delta_from(TouchPoint::new(0.1, 0.2));
        assert!((d.x - 0.2).abs() < 1e-6);
        assert!((d.y + 0.1).abs() < 1e-6);
    }
}
