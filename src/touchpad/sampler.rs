//! Adaptive sampling rate.
//!
//! The tick source runs fast while a gesture or momentum is active and falls back to a
//! slow rate after a run of idle ticks. Rate changes replace the timer instead of
//! mutating its period, so the new cadence starts cleanly from the switch point.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    pub active_interval_ms: u64,
    pub idle_interval_ms: u64,
    /// Idle ticks tolerated before dropping to the idle rate.
    pub idle_threshold_ticks: u32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            active_interval_ms: 8,
            idle_interval_ms: 100,
            idle_threshold_ticks: 60,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Active,
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingState {
    pub rate: SampleRate,
    pub idle_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct AdaptiveSampler {
    params: SamplerParams,
    state: SamplingState,
}

impl AdaptiveSampler {
    /// Starts at the active rate.
    pub fn new(params: SamplerParams) -> Self {
        Self {
            params,
            state: SamplingState {
                rate: SampleRate::Active,
                idle_ticks: 0,
            },
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SamplingState {
        self.state
    }

    pub fn rate(&self) -> SampleRate {
        self.state.rate
    }

    pub fn interval(&self) -> Duration {
        self.interval_for(self.state.rate)
    }

    pub fn interval_for(&self, rate: SampleRate) -> Duration {
        match rate {
            SampleRate::Active => Duration::from_millis(self.params.active_interval_ms),
            SampleRate::Idle => Duration::from_millis(self.params.idle_interval_ms),
        }
    }

    /// Records one tick's activity. Returns the new rate when it changed.
    pub fn observe(&mut self, active: bool) -> Option<SampleRate> {
        if active {
            self.state.idle_ticks = 0;
            return self.switch(SampleRate::Active);
        }

        self.state.idle_ticks = self.state.idle_ticks.saturating_add(1);
        if self.state.idle_ticks > self.params.idle_threshold_ticks {
            self.switch(SampleRate::Idle)
        } else {
            None
        }
    }

    fn switch(&mut self, rate: SampleRate) -> Option<SampleRate> {
        if self.state.rate == rate {
            return None;
        }
        info!(
            "Sampling rate {:?} -> {:?} ({:?} interval)",
            self.state.rate,
            rate,
            self.interval_for(rate)
        );
        self.state.rate = rate;
        Some(rate)
    }
}

/// Periodic tick source with a replaceable period.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    /// First tick fires immediately.
    pub fn new(period: Duration) -> Self {
        Self {
            interval: Self::build(Instant::now(), period),
        }
    }

    /// First tick fires one `period` from now.
    pub fn delayed(period: Duration) -> Self {
        Self {
            interval: Self::build(Instant::now() + period, period),
        }
    }

    fn build(start: Instant, period: Duration) -> Interval {
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    #[cfg(test)]
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Replaces the underlying timer; the next tick is one new period away.
    pub fn reschedule(&mut self, period: Duration) {
        self.interval = Self::build(Instant::now() + period, period);
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}
