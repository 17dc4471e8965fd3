//! HTTP presence fallback and its rate limiter.

mod dispatcher;
pub mod rate_limit;

pub use dispatcher::{DispatchTarget, PresenceDispatcher, DEFAULT_DISPATCH_INTERVAL, DISPATCH_USER_AGENT};
pub use rate_limit::{RateLimiter, TokenBucket};
