//! Touch trace replay.
//!
//! Stands in for a live controller: a TOML file of frames is played back one frame per
//! poll, then the touchpad reads as released.
//!
//! ```toml
//! [[frame]]
//! primary = [0.10, 0.20]
//! repeat = 5
//!
//! [[frame]]
//! primary = [0.10, 0.20]
//! secondary = [-0.30, 0.20]
//! button = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::touch::{TouchPoint, TouchSample, TouchSource};

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Failed to read trace {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse trace: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceFrame {
    pub primary: (f32, f32),
    pub secondary: (f32, f32),
    pub button: bool,
    /// Number of consecutive polls this frame is reported for (0 counts as 1).
    pub repeat: u32,
}

impl TraceFrame {
    fn sample(&self) -> TouchSample {
        TouchSample {
            primary: TouchPoint::from(self.primary),
            secondary: TouchPoint::from(self.secondary),
            button_pressed: self.button,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default, rename = "frame")]
    pub frames: Vec<TraceFrame>,
}

impl Trace {
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let trace = Self::parse(&text)?;
        info!(
            "Loaded touch trace {} with {} frames ({} polls)",
            path.display(),
            trace.frames.len(),
            trace.total_polls()
        );
        Ok(trace)
    }

    pub fn total_polls(&self) -> usize {
        self.frames.iter().map(|f| f.repeat.max(1) as usize).sum()
    }
}

#[derive(Debug)]
struct Cursor {
    frame: usize,
    repeat: u32,
    finished_logged: bool,
}

/// [`TouchSource`] backed by a [`Trace`].
#[derive(Debug)]
pub struct TraceSource {
    trace: Trace,
    cursor: Mutex<Cursor>,
}

impl TraceSource {
    pub fn new(trace: Trace) -> Self {
        Self {
            trace,
            cursor: Mutex::new(Cursor {
                frame: 0,
                repeat: 0,
                finished_logged: false,
            }),
        }
    }

    /// A present controller whose touchpad is never touched.
    pub fn idle() -> Self {
        Self::new(Trace::default())
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        match self.cursor.lock() {
            Ok(cursor) => cursor.frame >= self.trace.frames.len(),
            Err(_) => true,
        }
    }
}

impl TouchSource for TraceSource {
    fn is_present(&self) -> bool {
        true
    }

    fn poll(&self) -> Option<TouchSample> {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Trace cursor poisoned: {}", e);
                return None;
            }
        };

        let Some(frame) = self.trace.frames.get(cursor.frame) else {
            if !cursor.finished_logged {
                info!("Touch trace finished, touchpad reads as released");
                cursor.finished_logged = true;
            }
            return Some(TouchSample::idle());
        };

        let sample = frame.sample();
        cursor.repeat += 1;
        if cursor.repeat >= frame.repeat.max(1) {
            cursor.frame += 1;
            cursor.repeat = 0;
            debug!("Trace advanced to frame {}", cursor.frame);
        }
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"
        [[frame]]
        primary = [0.1, 0.2]
        repeat = 2

        [[frame]]
        primary = [0.1, 0.2]
        secondary = [-0.3, 0.2]
        button = true
    "#;

    #[test]
    fn parses_frames_with_defaults() {
        let trace = Trace::parse(TRACE).unwrap();
        assert_eq!(trace.frames.len(), 2);
        assert_eq!(trace.frames[0].secondary, (0.0, 0.0));
        assert!(!trace.frames[0].button);
        assert_eq!(trace.total_polls(), 3);
    }

    #[test]
    fn replays_frames_then_reports_released() {
        let source = TraceSource::new(Trace::parse(TRACE).unwrap());
        let first = source.poll().unwrap();
        assert_eq!(first, TouchSample::one_finger(0.1, 0.2));
        assert_eq!(source.poll().unwrap(), first);

        let third = source.poll().unwrap();
        assert!(third.button_pressed);
        assert_eq!(third.secondary, TouchPoint::new(-0.3, 0.2));
        assert!(source.is_finished());

        assert_eq!(source.poll().unwrap(), TouchSample::idle());
    }

    #[test]
    fn rejects_malformed_trace() {
        assert!(matches!(
            Trace::parse("[[frame]]\nprimary = \"left\""),
            Err(TraceError::Parse(_))
        ));
    }
}
