use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::TouchpadEngine;
use super::error::{EngineWarning, TouchpadError};
use super::sampler::{AdaptiveSampler, Ticker};
use super::service::EngineStatus;
use crate::config::{EngineTuning, TouchpadSettings};
use crate::controller::{HapticFeedback, PermissionCheck, TouchSource};
use crate::output::InputBackend;

/// Collaborators a running session is bound to.
#[derive(Clone)]
pub struct Bindings {
    pub source: Arc<dyn TouchSource>,
    pub backend: Arc<dyn InputBackend>,
    pub haptics: Arc<dyn HapticFeedback>,
    pub permissions: Arc<dyn PermissionCheck>,
}

// Outcome of the start-up checks
#[derive(Debug, Clone)]
pub struct Readiness {
    pub warning: Option<EngineWarning>,
}

#[state]
#[derive(Debug, Clone)]
pub enum RunnerState {
    Preparing,
    Running(Readiness),
}

#[machine]
pub struct TouchpadRunner<S: RunnerState> {
    bindings: Bindings,
    tuning: EngineTuning,
    settings: watch::Receiver<TouchpadSettings>,
    status: watch::Sender<EngineStatus>,
}

impl TouchpadRunner<Preparing> {
    pub fn create(
        bindings: Bindings,
        tuning: EngineTuning,
        settings: watch::Receiver<TouchpadSettings>,
        status: watch::Sender<EngineStatus>,
    ) -> Self {
        Self::new(bindings, tuning, settings, status)
    }

    /// Checks the controller, the injection permission and the haptic engine.
    ///
    /// A missing controller is fatal. A missing permission and a failing haptic engine
    /// only degrade the session.
    pub fn prepare(self) -> Result<TouchpadRunner<Running>, TouchpadError> {
        if !self.bindings.source.is_present() {
            return Err(TouchpadError::ConfigurationError(
                "No controller with a touchpad is connected".to_string(),
            ));
        }

        let warning = if self.bindings.permissions.is_authorized() {
            None
        } else {
            let warning = EngineWarning::PermissionWarning;
            warn!("{}", warning);
            Some(warning)
        };

        if let Err(e) = self.bindings.haptics.prepare() {
            warn!("Haptic feedback unavailable: {}", e);
        }

        let rate = AdaptiveSampler::new(self.tuning.sampler).rate();
        self.status.send_replace(EngineStatus::Running {
            rate,
            since: Local::now(),
            warning,
        });

        debug!("Transitioning to Running state");
        Ok(self.transition_with(Readiness { warning }))
    }
}

impl TouchpadRunner<Running> {
    pub fn warning(&self) -> Option<EngineWarning> {
        self.get_state_data().and_then(|readiness| readiness.warning)
    }

    /// Runs the tick loop until `token` is cancelled, then shuts the session down.
    pub async fn run(self, token: CancellationToken) {
        let mut engine = TouchpadEngine::new(
            self.tuning,
            self.bindings.backend.clone(),
            self.bindings.haptics.clone(),
        );
        let mut sampler = AdaptiveSampler::new(self.tuning.sampler);
        let mut ticker = Ticker::new(sampler.interval());
        let mut momentum_ticker: Option<Ticker> = None;

        let mut last_stats_time = Local::now();
        let mut last_stats = engine.stats();
        let stats_interval = chrono::Duration::seconds(30);

        info!(
            "Touchpad tracking started at {:?} rate ({:?} interval)",
            sampler.rate(),
            sampler.interval()
        );

        loop {
            let release_due = engine.next_release_due();

            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                _ = until(release_due) => engine.release_due(Instant::now()),

                now = ticker.tick() => {
                    let settings = *self.settings.borrow();
                    engine.sample_tick(self.bindings.source.poll(), settings, now);
                    engine.release_due(now);

                    if let Some(rate) = sampler.observe(engine.is_active()) {
                        ticker.reschedule(sampler.interval());
                        self.status.send_modify(|status| {
                            if let EngineStatus::Running { rate: current, .. } = status {
                                *current = rate;
                            }
                        });
                    }
                }

                _ = next_tick(&mut momentum_ticker) => engine.momentum_tick(),
            }

            match (&momentum_ticker, engine.momentum_active()) {
                (None, true) => {
                    momentum_ticker = Some(Ticker::delayed(self.tuning.momentum.interval()));
                }
                (Some(_), false) => momentum_ticker = None,
                _ => {}
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let stats = engine.stats();
                let elapsed_seconds = (now - last_stats_time).num_seconds();
                info!(
                    "Touchpad stats: {} ticks, {} momentum ticks in {} seconds",
                    stats.ticks - last_stats.ticks,
                    stats.momentum_ticks - last_stats.momentum_ticks,
                    elapsed_seconds
                );
                info!(
                    "Injected {} moves, {} scrolls, {} clicks, dropped {}",
                    stats.output.moves - last_stats.output.moves,
                    stats.output.scrolls - last_stats.output.scrolls,
                    stats.output.clicks - last_stats.output.clicks,
                    stats.output.dropped - last_stats.output.dropped
                );
                last_stats = stats;
                last_stats_time = now;
            }
        }

        drop(momentum_ticker);
        drop(ticker);
        engine.shutdown();
        self.bindings.haptics.release();
        info!("Touchpad tracking stopped");
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Ticker>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
