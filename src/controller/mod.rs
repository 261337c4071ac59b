//! Controller-side collaborators of the touchpad engine
//!
//! The engine never talks to controller hardware directly. It pulls samples
//! from a [`TouchSource`] once per tick and reaches the rest of the controller
//! through small capability traits:
//!
//! 1. [`touch`] - Touch samples, the pollable source and the authorization query
//! 2. [`haptics`] - Click feedback pulses
//! 3. [`replay`] - A trace-file backed source for running without hardware
//!
//! ```text
//! Controller ──► TouchSource::poll ──► TouchpadEngine
//!          ◄── HapticFeedback::pulse ◄──┘
//! ```

pub mod haptics;
pub mod replay;
pub mod touch;

pub use haptics::{HapticError, HapticFeedback, LogHaptics};
pub use replay::{Trace, TraceError, TraceSource};
pub use touch::{PermissionCheck, StaticPermission, TouchPoint, TouchSample, TouchSource};
