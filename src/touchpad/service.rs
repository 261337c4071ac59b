use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::error::{EngineWarning, TouchpadError};
use super::runner::{Bindings, TouchpadRunner};
use super::sampler::SampleRate;
use crate::config::{EngineTuning, TouchpadSettings};
use crate::controller::{HapticFeedback, PermissionCheck, TouchSource};
use crate::output::InputBackend;

/// Published engine state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineStatus {
    Disabled,
    Running {
        rate: SampleRate,
        since: DateTime<Local>,
        warning: Option<EngineWarning>,
    },
}

impl EngineStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, EngineStatus::Running { .. })
    }

    pub fn rate(&self) -> Option<SampleRate> {
        match self {
            EngineStatus::Running { rate, .. } => Some(*rate),
            EngineStatus::Disabled => None,
        }
    }
}

/// Collaborators handed to the service. An unbound controller or output stays `None`
/// until the host provides one.
pub struct Collaborators {
    pub source: Option<Arc<dyn TouchSource>>,
    pub backend: Option<Arc<dyn InputBackend>>,
    pub haptics: Arc<dyn HapticFeedback>,
    pub permissions: Arc<dyn PermissionCheck>,
}

struct Session {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the tick loop task.
///
/// At most one session runs at a time. `enable` and `disable` are idempotent.
pub struct TouchpadService {
    collaborators: Collaborators,
    tuning: EngineTuning,
    settings: watch::Receiver<TouchpadSettings>,
    status: watch::Sender<EngineStatus>,
    session: Mutex<Option<Session>>,
}

impl TouchpadService {
    pub fn new(
        collaborators: Collaborators,
        tuning: EngineTuning,
        settings: watch::Receiver<TouchpadSettings>,
    ) -> Self {
        let (status, _) = watch::channel(EngineStatus::Disabled);
        Self {
            collaborators,
            tuning,
            settings,
            status,
            session: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    pub async fn is_enabled(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Starts tracking. Does nothing when already running.
    pub async fn enable(&self) -> Result<(), TouchpadError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if !session.handle.is_finished() {
                debug!("Touchpad engine already enabled");
                return Ok(());
            }
        }

        let runner = TouchpadRunner::create(
            self.bind()?,
            self.tuning,
            self.settings.clone(),
            self.status.clone(),
        )
        .prepare()?;
        debug!("Session prepared, warning: {:?}", runner.warning());

        let token = CancellationToken::new();
        let run_token = token.clone();
        let handle = tokio::spawn(async move { runner.run(run_token).await });

        *slot = Some(Session { token, handle });
        info!("Touchpad engine enabled");
        Ok(())
    }

    /// Stops tracking and waits for the session to shut down. Does nothing when disabled.
    pub async fn disable(&self) -> Result<(), TouchpadError> {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            debug!("Touchpad engine already disabled");
            return Ok(());
        };

        session.token.cancel();
        let joined = session.handle.await;
        self.status.send_replace(EngineStatus::Disabled);
        joined.map_err(|e| TouchpadError::TaskError(e.to_string()))?;

        info!("Touchpad engine disabled");
        Ok(())
    }

    /// Keeps the engine in line with the `enabled` setting until `token` is cancelled.
    ///
    /// While enabled but without a controller, retries every second so tracking starts
    /// as soon as a controller connects.
    pub async fn supervise(&self, token: CancellationToken) {
        let mut settings = self.settings.clone();
        let mut retry = tokio::time::interval(Duration::from_secs(1));
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut waiting_logged = false;

        loop {
            let wanted = settings.borrow_and_update().enabled;
            let enabled = self.is_enabled().await;

            if wanted && !enabled {
                match self.enable().await {
                    Ok(()) => waiting_logged = false,
                    Err(TouchpadError::ConfigurationError(reason)) => {
                        if !waiting_logged {
                            error!(
                                "Cannot enable touchpad engine, waiting for controller: {}",
                                reason
                            );
                            waiting_logged = true;
                        }
                    }
                    Err(e) => error!("Failed to enable touchpad engine: {}", e),
                }
            } else if !wanted && enabled {
                if let Err(e) = self.disable().await {
                    error!("Failed to disable touchpad engine: {}", e);
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                changed = settings.changed() => {
                    if changed.is_err() {
                        debug!("Settings channel closed, supervisor stopping");
                        break;
                    }
                }
                _ = retry.tick() => {}
            }
        }
    }

    fn bind(&self) -> Result<Bindings, TouchpadError> {
        let source = self.collaborators.source.clone().ok_or_else(|| {
            TouchpadError::ConfigurationError("No touch source bound".to_string())
        })?;
        let backend = self.collaborators.backend.clone().ok_or_else(|| {
            TouchpadError::ConfigurationError("No pointer output bound".to_string())
        })?;
        Ok(Bindings {
            source,
            backend,
            haptics: self.collaborators.haptics.clone(),
            permissions: self.collaborators.permissions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{LogHaptics, StaticPermission, TouchSample};
    use crate::output::{Bounds, ButtonAction, InjectedEvent, MouseButton, VirtualDesktop};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Touchpad whose contact can be changed while the engine runs.
    struct TestPad {
        present: AtomicBool,
        sample: StdMutex<TouchSample>,
        drift: StdMutex<f32>,
    }

    impl TestPad {
        fn new(present: bool) -> Arc<Self> {
            Arc::new(Self {
                present: AtomicBool::new(present),
                sample: StdMutex::new(TouchSample::idle()),
                drift: StdMutex::new(0.0),
            })
        }

        fn touch(&self, sample: TouchSample, drift: f32) {
            *self.sample.lock().unwrap() = sample;
            *self.drift.lock().unwrap() = drift;
        }
    }

    impl TouchSource for TestPad {
        fn is_present(&self) -> bool {
            self.present.load(Ordering::Relaxed)
        }

        fn poll(&self) -> Option<TouchSample> {
            let mut sample = self.sample.lock().unwrap();
            let drift = *self.drift.lock().unwrap();
            let polled = *sample;
            sample.primary.x += drift;
            Some(polled)
        }
    }

    struct Rig {
        service: Arc<TouchpadService>,
        pad: Arc<TestPad>,
        desktop: Arc<VirtualDesktop>,
        haptics: Arc<LogHaptics>,
        settings: watch::Sender<TouchpadSettings>,
    }

    fn rig_with(pad: Arc<TestPad>, authorized: bool, enabled: bool) -> Rig {
        let desktop = Arc::new(VirtualDesktop::recording(Bounds::from_size(1920.0, 1080.0)));
        let haptics = Arc::new(LogHaptics::new());
        let (settings, settings_rx) = watch::channel(TouchpadSettings {
            enabled,
            ..TouchpadSettings::default()
        });
        let collaborators = Collaborators {
            source: Some(pad.clone()),
            backend: Some(desktop.clone()),
            haptics: haptics.clone(),
            permissions: Arc::new(StaticPermission(authorized)),
        };
        Rig {
            service: Arc::new(TouchpadService::new(
                collaborators,
                EngineTuning::default(),
                settings_rx,
            )),
            pad,
            desktop,
            haptics,
            settings,
        }
    }

    fn rig() -> Rig {
        rig_with(TestPad::new(true), true, true)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn enable_without_controller_is_a_configuration_error() {
        let rig = rig_with(TestPad::new(false), true, true);
        let result = rig.service.enable().await;
        assert!(matches!(result, Err(TouchpadError::ConfigurationError(_))));
        assert_eq!(rig.service.status(), EngineStatus::Disabled);
        assert!(!rig.service.is_enabled().await);
    }

    #[tokio::test(start_paused = true)]
    async fn enable_without_output_is_a_configuration_error() {
        let (_settings, settings_rx) = watch::channel(TouchpadSettings::default());
        let service = TouchpadService::new(
            Collaborators {
                source: Some(TestPad::new(true)),
                backend: None,
                haptics: Arc::new(LogHaptics::new()),
                permissions: Arc::new(StaticPermission(true)),
            },
            EngineTuning::default(),
            settings_rx,
        );
        assert!(matches!(
            service.enable().await,
            Err(TouchpadError::ConfigurationError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn enable_and_disable_are_idempotent() {
        let rig = rig();
        rig.service.enable().await.unwrap();
        rig.service.enable().await.unwrap();
        assert!(rig.service.status().is_running());

        rig.service.disable().await.unwrap();
        rig.service.disable().await.unwrap();
        assert_eq!(rig.service.status(), EngineStatus::Disabled);
        assert!(!rig.service.is_enabled().await);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_injection_warns_but_runs() {
        let rig = rig_with(TestPad::new(true), false, true);
        rig.service.enable().await.unwrap();
        let EngineStatus::Running { warning, .. } = rig.service.status() else {
            panic!("engine should be running");
        };
        assert_eq!(warning, Some(EngineWarning::PermissionWarning));
        rig.service.disable().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pad_drops_rate_and_touch_restores_it() {
        let rig = rig();
        rig.service.enable().await.unwrap();
        assert_eq!(rig.service.status().rate(), Some(SampleRate::Active));

        // 60 idle ticks at 8 ms, plus one to cross the threshold
        sleep_ms(1_000).await;
        assert_eq!(rig.service.status().rate(), Some(SampleRate::Idle));

        rig.pad.touch(TouchSample::one_finger(0.2, 0.2), 0.0);
        // one idle-rate tick
        sleep_ms(110).await;
        assert_eq!(rig.service.status().rate(), Some(SampleRate::Active));

        rig.service.disable().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn no_output_after_disable() {
        let rig = rig();
        rig.service.enable().await.unwrap();
        rig.pad.touch(TouchSample::one_finger(-0.5, 0.0), 0.01);
        sleep_ms(200).await;

        rig.service.disable().await.unwrap();
        let events = rig.desktop.events();
        assert!(events.iter().any(|e| matches!(e, InjectedEvent::Move(_))));

        sleep_ms(1_000).await;
        assert_eq!(rig.desktop.events(), events);
    }

    #[tokio::test(start_paused = true)]
    async fn sensitivity_change_applies_to_running_drag() {
        let rig = rig();
        rig.settings.send_modify(|settings| settings.sensitivity = 0.1);
        rig.service.enable().await.unwrap();
        rig.pad.touch(TouchSample::one_finger(-0.5, 0.0), 0.01);

        // let the filter settle on the constant drag speed
        sleep_ms(100).await;
        let slow_start = rig.desktop.pointer().x;
        sleep_ms(164).await;
        let slow = rig.desktop.pointer().x - slow_start;

        rig.settings.send_modify(|settings| settings.sensitivity = 1.0);
        sleep_ms(20).await;
        let fast_start = rig.desktop.pointer().x;
        sleep_ms(164).await;
        let fast = rig.desktop.pointer().x - fast_start;

        assert!(slow > 0.0);
        assert!(fast > 5.0 * slow, "slow {slow} px, fast {fast} px");
        rig.service.disable().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disable_delivers_pending_button_release() {
        let rig = rig();
        rig.service.enable().await.unwrap();
        rig.pad.touch(TouchSample::idle().with_button(true), 0.0);
        sleep_ms(9).await;
        rig.service.disable().await.unwrap();

        assert_eq!(
            rig.desktop.events(),
            vec![
                InjectedEvent::Button(MouseButton::Left, ButtonAction::Down),
                InjectedEvent::Button(MouseButton::Left, ButtonAction::Up),
            ]
        );
        assert_eq!(rig.haptics.pulses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_follows_enabled_setting_and_waits_for_controller() {
        let rig = rig_with(TestPad::new(false), true, true);
        let token = CancellationToken::new();
        let supervisor = {
            let service = rig.service.clone();
            let token = token.clone();
            tokio::spawn(async move { service.supervise(token).await })
        };

        sleep_ms(1_500).await;
        assert!(!rig.service.status().is_running());

        rig.pad.present.store(true, Ordering::Relaxed);
        sleep_ms(1_100).await;
        assert!(rig.service.status().is_running());

        rig.settings.send_modify(|settings| settings.enabled = false);
        sleep_ms(50).await;
        assert_eq!(rig.service.status(), EngineStatus::Disabled);

        token.cancel();
        supervisor.await.unwrap();
    }
}
