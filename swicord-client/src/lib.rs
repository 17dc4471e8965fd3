//! Swicord client library: gateway presence session, periodic presence
//! refresh and a rate-limited HTTP fallback.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod log_sink;
pub mod presence;

pub use config::{Config, Credentials};
pub use dispatch::{PresenceDispatcher, RateLimiter};
pub use error::{Error, Result};
pub use gateway::{ConnectionStatus, GatewaySession, SessionState};
pub use log_sink::{LogSink, MemorySink, TracingSink};
pub use presence::{build_presence_update, AutoPresence};

pub use swicord_common;
