use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ButtonAction, InputBackend, MouseButton, OutputError, Point};

/// Injection counters, reported in the tick loop statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputCounters {
    pub moves: u64,
    pub scrolls: u64,
    pub clicks: u64,
    pub dropped: u64,
}

#[derive(Clone, Copy, Debug)]
struct PendingRelease {
    due: Instant,
    button: MouseButton,
    at: Point,
}

/// Sink contract over a raw [`InputBackend`].
///
/// Button releases are not slept on: `click` records them with a due time and the owner
/// of the tick loop delivers them through [`PointerOutput::release_due`].
pub struct PointerOutput {
    backend: Arc<dyn InputBackend>,
    click_hold: Duration,
    pending: Vec<PendingRelease>,
    counters: OutputCounters,
}

impl PointerOutput {
    pub fn new(backend: Arc<dyn InputBackend>, click_hold: Duration) -> Self {
        Self {
            backend,
            click_hold,
            pending: Vec::new(),
            counters: OutputCounters::default(),
        }
    }

    /// Moves the pointer by whole pixels. Positive `dy` moves up.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        let result = self.backend.pointer_location().and_then(|current| {
            let bounds = self.backend.screen_bounds()?;
            let target = bounds.clamp(Point::new(current.x + dx as f64, current.y - dy as f64));
            self.backend.move_to(target)
        });
        match result {
            Ok(()) => self.counters.moves += 1,
            Err(e) => self.drop_event("move", e),
        }
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32) {
        match self.backend.scroll(dx, dy) {
            Ok(()) => self.counters.scrolls += 1,
            Err(e) => self.drop_event("scroll", e),
        }
    }

    /// Presses `button` at the current pointer location and schedules its release.
    ///
    /// Returns `false` when the press could not be injected; no release is scheduled then.
    pub fn click(&mut self, button: MouseButton, now: Instant) -> bool {
        let result = self.backend.pointer_location().and_then(|at| {
            self.backend.button(button, ButtonAction::Down, at)?;
            Ok(at)
        });
        match result {
            Ok(at) => {
                info!("{:?} click at ({:.0}, {:.0})", button, at.x, at.y);
                self.pending.push(PendingRelease {
                    due: now + self.click_hold,
                    button,
                    at,
                });
                self.counters.clicks += 1;
                true
            }
            Err(e) => {
                self.drop_event("click", e);
                false
            }
        }
    }

    pub fn next_release_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    #[cfg(test)]
    pub fn has_pending_release(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Delivers every release whose due time has passed.
    pub fn release_due(&mut self, now: Instant) {
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        for release in due {
            self.release(release);
        }
    }

    /// Delivers all scheduled releases immediately.
    pub fn release_all(&mut self) {
        let pending: Vec<_> = self.pending.drain(..).collect();
        if !pending.is_empty() {
            debug!("Flushing {} pending button releases", pending.len());
        }
        for release in pending {
            self.release(release);
        }
    }

    pub fn counters(&self) -> OutputCounters {
        self.counters
    }

    fn release(&mut self, release: PendingRelease) {
        if let Err(e) = self
            .backend
            .button(release.button, ButtonAction::Up, release.at)
        {
            self.drop_event("release", e);
        }
    }

    fn drop_event(&mut self, kind: &str, error: OutputError) {
        self.counters.dropped += 1;
        debug!("Dropped {} injection: {}", kind, error);
    }
}
