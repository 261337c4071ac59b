//! Pointer output: the host-side sink for synthesized input.
//!
//! A platform integration implements [`InputBackend`], the raw injection
//! primitives. [`PointerOutput`] layers the sink contract the engine relies on
//! over it: relative moves clamped to the screen with the touch Y axis
//! inverted, clicks as a down event followed by a delayed up event at the
//! current pointer location, and best-effort delivery (a failed injection is
//! dropped, never queued or retried).

pub mod pointer;
pub mod virtual_desktop;

pub use pointer::{OutputCounters, PointerOutput};
pub use virtual_desktop::{InjectedEvent, VirtualDesktop};

use serde::{Deserialize, Serialize};

/// Screen position in pixels, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Screen rectangle used to clamp pointer moves.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_size(width: f64, height: f64) -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: width,
            max_y: height,
        }
    }

    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
        )
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Down,
    Up,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OutputError {
    #[error("Input backend unavailable")]
    Unavailable,

    #[error("Input event rejected: {0}")]
    Rejected(String),
}

/// Raw system-wide input injection.
///
/// Every call must return promptly; the engine invokes these from its tick.
pub trait InputBackend: Send + Sync {
    fn pointer_location(&self) -> Result<Point, OutputError>;
    fn screen_bounds(&self) -> Result<Bounds, OutputError>;
    fn move_to(&self, position: Point) -> Result<(), OutputError>;
    fn button(&self, button: MouseButton, action: ButtonAction, at: Point)
        -> Result<(), OutputError>;
    /// Pixel-unit scroll; horizontal and vertical are independent.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), OutputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_points_on_screen() {
        let bounds = Bounds::from_size(1920.0, 1080.0);
        assert_eq!(bounds.clamp(Point::new(-5.0, 2000.0)), Point::new(0.0, 1080.0));
        assert_eq!(bounds.center(), Point::new(960.0, 540.0));
    }
}
