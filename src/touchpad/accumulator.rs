//! Sub-pixel accumulation: continuous deltas in, whole-unit events out.

use super::filter::Vec2;

/// Adds `delta` to `pending` and emits `round_ties_even(pending)` when it is non-zero.
///
/// Emission starts above half a unit; exactly ±0.5 rounds to zero and is held, as are
/// other even-rounding ties such as 2.5 emitting 2. The emitted amount is subtracted, so
/// the returned remainder stays within ±0.5 and the running total of emissions tracks
/// the running total of input.
pub fn accumulate(pending: f32, delta: f32) -> (Option<i32>, f32) {
    let total = pending + delta;
    if total.abs() < 0.5 {
        return (None, total);
    }
    let whole = total.round_ties_even();
    if whole == 0.0 {
        (None, total)
    } else {
        (Some(whole as i32), total - whole)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubPixelAccumulator {
    pending: Vec2,
}

impl SubPixelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(x, y)` whole units when at least one axis crossed the threshold.
    pub fn push(&mut self, delta: Vec2) -> Option<(i32, i32)> {
        let (emit_x, pending_x) = accumulate(self.pending.x, delta.x);
        let (emit_y, pending_y) = accumulate(self.pending.y, delta.y);
        self.pending = Vec2::new(pending_x, pending_y);

        match (emit_x, emit_y) {
            (None, None) => None,
            (x, y) => Some((x.unwrap_or(0), y.unwrap_or(0))),
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> Vec2 {
        self.pending
    }

    pub fn reset(&mut self) {
        self.pending = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted_total(deltas: &[f32]) -> (i64, f32) {
        let mut pending = 0.0;
        let mut total = 0i64;
        for &delta in deltas {
            let (emit, next) = accumulate(pending, delta);
            pending = next;
            if let Some(units) = emit {
                total += units as i64;
            }
            assert!(pending.abs() <= 0.5 + 1e-4, "remainder {pending} out of range");
        }
        (total, pending)
    }

    #[test]
    fn small_deltas_are_held_back() {
        assert_eq!(accumulate(0.0, 0.3), (None, 0.3));
        let (emit, pending) = accumulate(0.3, 0.3);
        assert_eq!(emit, Some(1));
        assert!((pending + 0.4).abs() < 1e-6);
    }

    #[test]
    fn negative_motion_emits_negative_units() {
        let (emit, pending) = accumulate(-0.2, -2.5);
        assert_eq!(emit, Some(-3));
        assert!((pending - 0.3).abs() < 1e-5);
    }

    #[test]
    fn total_is_preserved_under_rechunking() {
        let sum = 37.3_f32;
        let chunkings: [usize; 5] = [1, 3, 17, 100, 997];
        for parts in chunkings {
            let deltas = vec![sum / parts as f32; parts];
            let (total, _) = emitted_total(&deltas);
            assert!(
                (total as f32 - sum).abs() <= 1.0,
                "{parts} chunks emitted {total}"
            );
        }
    }

    #[test]
    fn mixed_sign_sequence_tracks_running_sum() {
        let deltas = [0.7, -0.2, 0.45, -1.3, 0.05, 2.2, -0.6, 0.33, 0.33, 0.33];
        let mut running = 0.0_f32;
        let mut pending = 0.0;
        let mut total = 0i64;
        for delta in deltas {
            running += delta;
            let (emit, next) = accumulate(pending, delta);
            pending = next;
            total += emit.unwrap_or(0) as i64;
            assert!((total as f32 - running).abs() <= 0.5 + 1e-4);
        }
    }

    #[test]
    fn half_remainder_does_not_oscillate_on_zero_input() {
        let mut pending = 0.5;
        for _ in 0..10 {
            let (emit, next) = accumulate(pending, 0.0);
            assert_eq!(emit, None);
            pending = next;
        }
    }

    #[test]
    fn exact_half_units_round_to_even() {
        assert_eq!(accumulate(0.25, 0.25), (None, 0.5));
        assert_eq!(accumulate(0.0, -0.5), (None, -0.5));
        assert_eq!(accumulate(0.5, 0.5), (Some(1), 0.0));
        assert_eq!(accumulate(1.0, 1.5), (Some(2), 0.5));
    }

    #[test]
    fn axes_emit_independently() {
        let mut acc = SubPixelAccumulator::new();
        assert_eq!(acc.push(Vec2::new(0.6, 0.1)), Some((1, 0)));
        assert!((acc.pending().y - 0.1).abs() < 1e-6);
        assert_eq!(acc.push(Vec2::new(0.0, 0.0)), None);
        acc.reset();
        assert_eq!(acc.pending(), Vec2::ZERO);
    }
}
