//! In-process desktop used when no platform backend is bound.
//!
//! Tracks a pointer position inside fixed bounds and logs every injection. The
//! recording variant also keeps the event history for inspection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{Bounds, ButtonAction, InputBackend, MouseButton, OutputError, Point};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InjectedEvent {
    Move(Point),
    Button(MouseButton, ButtonAction),
    Scroll(i32, i32),
}

#[derive(Debug)]
struct DesktopState {
    pointer: Point,
    history: Option<Vec<InjectedEvent>>,
}

#[derive(Debug)]
pub struct VirtualDesktop {
    bounds: Bounds,
    available: AtomicBool,
    state: Mutex<DesktopState>,
}

impl VirtualDesktop {
    /// Pointer starts at the center of `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self::build(bounds, None)
    }

    pub fn recording(bounds: Bounds) -> Self {
        Self::build(bounds, Some(Vec::new()))
    }

    fn build(bounds: Bounds, history: Option<Vec<InjectedEvent>>) -> Self {
        Self {
            bounds,
            available: AtomicBool::new(true),
            state: Mutex::new(DesktopState {
                pointer: bounds.center(),
                history,
            }),
        }
    }

    /// Simulates the host refusing injections.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn pointer(&self) -> Point {
        self.state
            .lock()
            .map(|state| state.pointer)
            .unwrap_or_default()
    }

    /// Recorded events; empty for a non-recording desktop.
    pub fn events(&self) -> Vec<InjectedEvent> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.history.clone())
            .unwrap_or_default()
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut DesktopState) -> T,
    ) -> Result<T, OutputError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(OutputError::Unavailable);
        }
        let mut state = self
            .state
            .lock()
            .map_err(|e| OutputError::Rejected(e.to_string()))?;
        Ok(f(&mut state))
    }

    fn record(state: &mut DesktopState, event: InjectedEvent) {
        if let Some(history) = state.history.as_mut() {
            history.push(event);
        }
    }
}

impl InputBackend for VirtualDesktop {
    fn pointer_location(&self) -> Result<Point, OutputError> {
        self.with_state(|state| state.pointer)
    }

    fn screen_bounds(&self) -> Result<Bounds, OutputError> {
        Ok(self.bounds)
    }

    fn move_to(&self, position: Point) -> Result<(), OutputError> {
        self.with_state(|state| {
            state.pointer = position;
            Self::record(state, InjectedEvent::Move(position));
        })?;
        debug!("Pointer moved to ({:.0}, {:.0})", position.x, position.y);
        Ok(())
    }

    fn button(
        &self,
        button: MouseButton,
        action: ButtonAction,
        at: Point,
    ) -> Result<(), OutputError> {
        self.with_state(|state| Self::record(state, InjectedEvent::Button(button, action)))?;
        info!(
            "Button {:?} {:?} at ({:.0}, {:.0})",
            button, action, at.x, at.y
        );
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), OutputError> {
        self.with_state(|state| Self::record(state, InjectedEvent::Scroll(dx, dy)))?;
        debug!("Scrolled by ({}, {})", dx, dy);
        Ok(())
    }
}
