//! Haptic feedback collaborator for synthesized clicks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum HapticError {
    #[error("Haptic engine not prepared")]
    NotPrepared,

    #[error("Haptic playback failed: {0}")]
    PlaybackFailed(String),
}

/// Fire-and-forget feedback pulse on the controller.
///
/// `prepare` is called when tracking starts (and at most once more after a failed pulse),
/// `release` when tracking stops.
pub trait HapticFeedback: Send + Sync {
    fn prepare(&self) -> Result<(), HapticError>;
    fn pulse(&self) -> Result<(), HapticError>;
    fn release(&self);
}

/// Haptics stand-in that only logs, used when the controller has no haptic actuator.
#[derive(Debug, Default)]
pub struct LogHaptics {
    prepared: AtomicBool,
    pulses: AtomicUsize,
}

impl LogHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> usize {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl HapticFeedback for LogHaptics {
    fn prepare(&self) -> Result<(), HapticError> {
        self.prepared.store(true, Ordering::Relaxed);
        info!("Haptic feedback prepared");
        Ok(())
    }

    fn pulse(&self) -> Result<(), HapticError> {
        if !self.prepared.load(Ordering::Relaxed) {
            return Err(HapticError::NotPrepared);
        }
        let count = self.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Haptic pulse #{}", count);
        Ok(())
    }

    fn release(&self) {
        self.prepared.store(false, Ordering::Relaxed);
        info!("Haptic feedback released");
    }
}
