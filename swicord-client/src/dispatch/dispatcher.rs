//! HTTP presence fallback.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use swicord_common::PresenceRequest;

use super::rate_limit::RateLimiter;
use crate::config::{Credentials, DispatcherConfig};
use crate::error::{Error, Result};

pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(300);

/// User agent the presence endpoint expects from mobile clients.
pub const DISPATCH_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 11) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/100.0.4896.127 Mobile OceanHero/6 Safari/537.36";

const DISPATCH_CACHE_CONTROL: &str = "max-age=121";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// What the periodic loop reports.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTarget {
    pub identifier: Option<String>,
    pub state: String,
}

impl Default for DispatchTarget {
    fn default() -> Self {
        Self {
            identifier: None,
            state: "START".to_string(),
        }
    }
}

/// Posts presence state over HTTP, behind a client-side rate limiter.
///
/// Every outcome is logged here; callers may ignore the returned result.
pub struct PresenceDispatcher {
    http_client: Client,
    endpoint: String,
    credentials: Credentials,
    limiter: RateLimiter,
    target: Mutex<DispatchTarget>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceDispatcher {
    pub fn new(config: &DispatcherConfig, credentials: &Credentials) -> Result<Self> {
        Self::with_limiter(config, credentials, RateLimiter::new())
    }

    pub fn with_limiter(
        config: &DispatcherConfig,
        credentials: &Credentials,
        limiter: RateLimiter,
    ) -> Result<Self> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            credentials: credentials.clone(),
            limiter,
            target: Mutex::new(DispatchTarget {
                identifier: config.package_name.clone(),
                state: config.state.clone(),
            }),
            task: Mutex::new(None),
        })
    }

    /// POST `{package_name?, update}` to the presence endpoint.
    ///
    /// `Ok` only on 204. A locally rate-limited call never reaches the network.
    pub async fn dispatch(&self, identifier: Option<&str>, state: &str) -> Result<()> {
        if !self.limiter.try_acquire() {
            tracing::info!("Presence dispatch skipped: rate limited locally");
            return Err(Error::RateLimitedLocal);
        }

        let token = self.credentials.token();
        if token.is_empty() {
            tracing::error!("Presence dispatch skipped: missing token");
            return Err(Error::Configuration("missing token".to_string()));
        }

        let body = PresenceRequest {
            package_name: identifier.map(str::to_string),
            update: state.to_string(),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, DISPATCH_CACHE_CONTROL)
            .header(USER_AGENT, DISPATCH_USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Presence dispatch failed: {}", e);
                Error::Http(e)
            })?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                tracing::info!(state, "Presence dispatched");
                Ok(())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::info!("Presence dispatch rate limited by server");
                Err(Error::RateLimitedRemote)
            }
            status => {
                tracing::error!("Presence dispatch failed with HTTP {}", status.as_u16());
                Err(Error::Status(status.as_u16()))
            }
        }
    }

    pub fn target(&self) -> DispatchTarget {
        self.lock_target().clone()
    }

    /// Change what the periodic loop reports from its next tick on.
    pub fn set_target(&self, identifier: Option<String>, state: impl Into<String>) {
        *self.lock_target() = DispatchTarget {
            identifier,
            state: state.into(),
        };
    }

    /// Dispatch the current target once.
    pub async fn dispatch_current(&self) -> Result<()> {
        let target = self.target();
        self.dispatch(target.identifier.as_deref(), &target.state)
            .await
    }

    /// Dispatch the current target every `period`, first one period from
    /// now. Replaces a loop that is already running.
    pub fn start_periodic(self: &Arc<Self>, period: Duration) {
        let period = period.max(MIN_PERIOD);
        let dispatcher = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(dispatcher) = dispatcher.upgrade() else {
                    return;
                };
                // Outcome already logged.
                let _ = dispatcher.dispatch_current().await;
            }
        });

        if let Some(previous) = self.lock_task().replace(handle) {
            previous.abort();
        }
        tracing::info!("Presence dispatch every {}s", period.as_secs());
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            tracing::info!("Presence dispatch stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock_target(&self) -> MutexGuard<'_, DispatchTarget> {
        self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PresenceDispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}
