//! Touchpad-to-pointer translation
//!
//! This module turns per-tick touchpad samples into pointer motion, scroll and clicks:
//!
//! 1. [`filter`] - Exponential smoothing of raw deltas
//! 2. [`curve`] - Velocity-dependent acceleration
//! 3. [`accumulator`] - Sub-pixel carry between ticks
//! 4. [`gesture`] - One-finger, two-finger and tap classification
//! 5. [`momentum`] - Decaying scroll after a two-finger release
//! 6. [`sampler`] - Active and idle tick rates
//! 7. [`engine`] - The per-tick pipeline tying the above together
//! 8. [`runner`] / [`service`] - Session lifecycle and the tick loop task
//!
//! ```text
//! TouchSource ──► Ticker ──► TouchpadEngine ──► PointerOutput ──► InputBackend
//!                   ▲              │
//!                   └─ sampler ◄───┘ (active / idle)
//! ```

pub mod accumulator;
pub mod curve;
pub mod engine;
pub mod error;
pub mod filter;
pub mod gesture;
pub mod momentum;
pub mod runner;
pub mod sampler;
pub mod service;

pub use engine::TouchpadEngine;
pub use error::{EngineWarning, TouchpadError};
pub use service::{Collaborators, EngineStatus, TouchpadService};
