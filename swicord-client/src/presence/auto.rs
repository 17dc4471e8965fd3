//! Periodic presence refresh over the gateway session.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use swicord_common::PresenceConfig;

use crate::gateway::GatewaySession;

pub const DEFAULT_AUTO_UPDATE_INTERVAL: Duration = Duration::from_secs(20);

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Re-sends the current presence on a fixed period.
///
/// The first update goes out as soon as the loop starts. The config can be
/// swapped while running; the next tick picks it up. Dropping this stops the
/// loop.
pub struct AutoPresence {
    session: GatewaySession,
    config: watch::Sender<PresenceConfig>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoPresence {
    pub fn new(session: GatewaySession, config: PresenceConfig) -> Self {
        let (config, _) = watch::channel(config);
        Self {
            session,
            config,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> PresenceConfig {
        self.config.borrow().clone()
    }

    pub fn set_config(&self, config: PresenceConfig) {
        self.config.send_replace(config);
    }

    /// Start the loop, replacing one that is already running.
    pub fn start(&self, period: Duration) {
        let period = period.max(MIN_PERIOD);
        let session = self.session.clone();
        let config = self.config.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let snapshot = config.borrow().clone();
                session.update_presence(&snapshot).await;
            }
        });

        if let Some(previous) = self.lock_task().replace(handle) {
            previous.abort();
            tracing::debug!("Replaced running presence auto-update");
        }
        tracing::info!("Presence auto-update every {}s", period.as_secs_f64());
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            tracing::info!("Presence auto-update stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AutoPresence {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}
