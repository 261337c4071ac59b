//! Error and warning types of the touchpad engine

use thiserror::Error;

/// Errors returned when starting or stopping the engine.
///
/// None of these escape the tick loop; inside a running session the engine fails soft by
/// returning to `Idle`.
#[derive(Debug, Error)]
pub enum TouchpadError {
    /// Engine asked to start without a controller or without a bound collaborator.
    /// The engine stays disabled.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The tick loop task could not be joined.
    #[error("Task error: {0}")]
    TaskError(String),
}

/// Non-fatal conditions surfaced through the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineWarning {
    /// Input injection is not authorized; events may not reach other applications.
    #[error("Input injection is not authorized; grant accessibility permission")]
    PermissionWarning,
}
