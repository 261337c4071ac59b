//! Gesture classification state machine.
//!
//! ```text
//!            primary only            both
//!   Idle ─────────────────► OneFinger ─────► TwoFinger
//!    ▲  ◄───── lift ───────────┘  ▲              │
//!    │                            └─ secondary ──┤
//!    └──────────────── all lift ─────────────────┘
//! ```
//!
//! Each tick maps the current state and one [`TouchSample`] to exactly one next state and
//! one [`GestureAction`]. Motion is reported as raw deltas; smoothing and scaling happen
//! downstream in the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::filter::Vec2;
use crate::controller::{TouchPoint, TouchSample};

/// Thresholds for contact detection and two-finger tap disambiguation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTuning {
    /// Per-axis magnitude above which a finger channel counts as touching.
    pub touch_epsilon: f32,
    /// How long a stationary two-finger contact must last to become a right-click.
    pub tap_window_ms: u64,
    /// Per-tick averaged two-finger movement separating "stationary" from "scrolling".
    pub tap_threshold: f32,
}

impl GestureTuning {
    pub fn tap_window(&self) -> Duration {
        Duration::from_millis(self.tap_window_ms)
    }
}

impl Default for GestureTuning {
    fn default() -> Self {
        Self {
            touch_epsilon: 0.001,
            tap_window_ms: 300,
            tap_threshold: 0.02,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureState {
    Idle,
    OneFinger {
        last: TouchPoint,
    },
    TwoFinger {
        last_primary: TouchPoint,
        last_secondary: TouchPoint,
        started_at: Instant,
        tap_consumed: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactKind {
    OneFinger,
    TwoFinger,
}

/// What a tick's transition asks the engine to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureAction {
    /// Idle and still untouched.
    None,
    /// A contact was seeded; no motion on the seeding tick.
    Began(ContactKind),
    /// One-finger raw delta.
    Pointer(Vec2),
    /// Two fingers resting, still inside the tap window.
    TapPending,
    RightClick,
    /// Averaged two-finger raw delta.
    Scroll(Vec2),
    /// Two fingers resting after the tap was consumed.
    Hold,
    /// Two-finger contact ended; the primary finger may still be down.
    TwoFingerLifted { primary_remains: bool },
    /// One-finger contact ended.
    Lifted,
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    tuning: GestureTuning,
    state: GestureState,
}

impl GestureClassifier {
    pub fn new(tuning: GestureTuning) -> Self {
        Self {
            tuning,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    pub fn classify(&mut self, sample: &TouchSample, now: Instant) -> GestureAction {
        let eps = self.tuning.touch_epsilon;
        let primary = sample.primary.is_touching(eps);
        let secondary = sample.secondary.is_touching(eps);

        let (next, action) = match (self.state, primary, secondary) {
            (GestureState::Idle, false, _) => (GestureState::Idle, GestureAction::None),

            (GestureState::Idle, true, false) => (
                GestureState::OneFinger {
                    last: sample.primary,
                },
                GestureAction::Began(ContactKind::OneFinger),
            ),

            (GestureState::Idle | GestureState::OneFinger { .. }, true, true) => (
                GestureState::TwoFinger {
                    last_primary: sample.primary,
                    last_secondary: sample.secondary,
                    started_at: now,
                    tap_consumed: false,
                },
                GestureAction::Began(ContactKind::TwoFinger),
            ),

            (GestureState::OneFinger { last }, true, false) => (
                GestureState::OneFinger {
                    last: sample.primary,
                },
                GestureAction::Pointer(sample.primary.delta_from(last)),
            ),

            (GestureState::OneFinger { .. }, false, _) => {
                (GestureState::Idle, GestureAction::Lifted)
            }

            (
                GestureState::TwoFinger {
                    last_primary,
                    last_secondary,
                    started_at,
                    tap_consumed,
                },
                true,
                true,
            ) => {
                let avg = (sample.primary.delta_from(last_primary)
                    + sample.secondary.delta_from(last_secondary))
                    * 0.5;
                let (tap_consumed, action) =
                    self.two_finger_step(avg, now.saturating_duration_since(started_at), tap_consumed);
                (
                    GestureState::TwoFinger {
                        last_primary: sample.primary,
                        last_secondary: sample.secondary,
                        started_at,
                        tap_consumed,
                    },
                    action,
                )
            }

            (GestureState::TwoFinger { .. }, true, false) => (
                GestureState::OneFinger {
                    last: sample.primary,
                },
                GestureAction::TwoFingerLifted {
                    primary_remains: true,
                },
            ),

            (GestureState::TwoFinger { .. }, false, _) => (
                GestureState::Idle,
                GestureAction::TwoFingerLifted {
                    primary_remains: false,
                },
            ),
        };

        if std::mem::discriminant(&next) != std::mem::discriminant(&self.state) {
            debug!("Gesture transition {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        action
    }

    fn two_finger_step(
        &self,
        avg: Vec2,
        elapsed: Duration,
        tap_consumed: bool,
    ) -> (bool, GestureAction) {
        let movement = avg.length();
        let threshold = self.tuning.tap_threshold;
        let window = self.tuning.tap_window();

        if !tap_consumed && elapsed < window && movement < threshold {
            (false, GestureAction::TapPending)
        } else if !tap_consumed && movement < threshold {
            (true, GestureAction::RightClick)
        } else if movement > threshold {
            (true, GestureAction::Scroll(avg))
        } else {
            (tap_consumed, GestureAction::Hold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(GestureTuning::default())
    }

    #[test]
    fn primary_touch_starts_one_finger() {
        let mut c = classifier();
        let now = Instant::now();
        assert_eq!(c.classify(&TouchSample::idle(), now), GestureAction::None);
        assert_eq!(
            c.classify(&TouchSample::one_finger(0.2, 0.1), now),
            GestureAction::Began(ContactKind::OneFinger)
        );
        assert!(matches!(c.state(), GestureState::OneFinger { .. }));
    }

    #[test]
    fn one_finger_reports_delta_and_tracks_position() {
        let mut c = classifier();
        let now = Instant::now();
        c.classify(&TouchSample::one_finger(0.2, 0.1), now);
        let GestureAction::Pointer(delta) = c.classify(&TouchSample::one_finger(0.25, 0.05), now)
        else {
            panic!("expected pointer motion");
        };
        assert!((delta.x - 0.05).abs() < 1e-6);
        assert!((delta.y + 0.05).abs() < 1e-6);
        assert_eq!(
            c.state(),
            GestureState::OneFinger {
                last: TouchPoint::new(0.25, 0.05)
            }
        );
    }

    #[test]
    fn lift_returns_to_idle() {
        let mut c = classifier();
        let now = Instant::now();
        c.classify(&TouchSample::one_finger(0.2, 0.1), now);
        assert_eq!(c.classify(&TouchSample::idle(), now), GestureAction::Lifted);
        assert!(c.is_idle());
    }

    #[test]
    fn secondary_only_contact_is_ignored() {
        let mut c = classifier();
        let sample = TouchSample::two_fingers((0.0, 0.0), (0.4, 0.4));
        assert_eq!(c.classify(&sample, Instant::now()), GestureAction::None);
        assert!(c.is_idle());
    }

    #[test]
    fn stationary_two_fingers_right_click_once_after_window() {
        let mut c = classifier();
        let t0 = Instant::now();
        let sample = TouchSample::two_fingers((0.3, 0.3), (-0.3, -0.3));
        assert_eq!(
            c.classify(&sample, t0),
            GestureAction::Began(ContactKind::TwoFinger)
        );
        assert_eq!(
            c.classify(&sample, t0 + Duration::from_millis(100)),
            GestureAction::TapPending
        );
        assert_eq!(
            c.classify(&sample, t0 + Duration::from_millis(300)),
            GestureAction::RightClick
        );
        assert_eq!(
            c.classify(&sample, t0 + Duration::from_millis(500)),
            GestureAction::Hold
        );
    }

    #[test]
    fn moving_two_fingers_scroll_and_suppress_tap() {
        let mut c = classifier();
        let t0 = Instant::now();
        c.classify(&TouchSample::two_fingers((0.3, 0.3), (-0.3, -0.3)), t0);
        let action = c.classify(
            &TouchSample::two_fingers((0.3, 0.34), (-0.3, -0.26)),
            t0 + Duration::from_millis(8),
        );
        let GestureAction::Scroll(avg) = action else {
            panic!("expected scroll, got {action:?}");
        };
        assert!((avg.y - 0.04).abs() < 1e-5);

        // resting after a scroll never turns into a right-click
        let still = TouchSample::two_fingers((0.3, 0.34), (-0.3, -0.26));
        assert_eq!(
            c.classify(&still, t0 + Duration::from_millis(900)),
            GestureAction::Hold
        );
    }

    #[test]
    fn secondary_lift_falls_back_to_one_finger_at_current_primary() {
        let mut c = classifier();
        let t0 = Instant::now();
        c.classify(&TouchSample::two_fingers((0.3, 0.3), (-0.3, -0.3)), t0);
        assert_eq!(
            c.classify(&TouchSample::one_finger(0.35, 0.3), t0),
            GestureAction::TwoFingerLifted {
                primary_remains: true
            }
        );
        assert_eq!(
            c.state(),
            GestureState::OneFinger {
                last: TouchPoint::new(0.35, 0.3)
            }
        );
    }

    #[test]
    fn one_finger_upgrades_to_two_finger() {
        let mut c = classifier();
        let t0 = Instant::now();
        c.classify(&TouchSample::one_finger(0.3, 0.3), t0);
        assert_eq!(
            c.classify(&TouchSample::two_fingers((0.3, 0.3), (-0.2, 0.1)), t0),
            GestureAction::Began(ContactKind::TwoFinger)
        );
    }

    #[test]
    fn every_input_combination_has_a_transition() {
        let samples = [
            TouchSample::idle(),
            TouchSample::one_finger(0.2, 0.2),
            TouchSample::two_fingers((0.0, 0.0), (0.2, 0.2)),
            TouchSample::two_fingers((0.2, 0.2), (-0.2, 0.2)),
        ];
        let t0 = Instant::now();
        for first in samples {
            for second in samples {
                let mut c = classifier();
                c.classify(&first, t0);
                c.classify(&second, t0 + Duration::from_millis(8));
                let expect_idle = !second.primary.is_touching(0.001);
                assert_eq!(c.is_idle(), expect_idle, "{first:?} -> {second:?}");
            }
        }
    }
}
