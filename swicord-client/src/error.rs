//! Error types for the presence client.

/// Error types for session and dispatch operations.
///
/// None of these are fatal: the worst outcome is a session that is not
/// connected, which the caller can fix by connecting again.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed endpoint URL or missing token. Nothing was attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Socket connect, read or write failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unparseable frame or an opcode arriving out of sequence.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Rate limited locally, request skipped")]
    RateLimitedLocal,

    #[error("Rate limited by server")]
    RateLimitedRemote,

    /// Any response other than 204 or 429 on the HTTP fallback.
    #[error("Presence endpoint returned HTTP {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
