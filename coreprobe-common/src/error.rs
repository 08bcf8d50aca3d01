//! Error types for coreprobe

use thiserror::Error;

/// Error types for the coreprobe library.
///
/// Failures are scoped to a single simulated UE: a `Crypto` or `Config`
/// error terminates that UE's scenario, while `Protocol` and `Transport`
/// conditions are logged at the point of occurrence and the offending
/// message is dropped.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors, fatal at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected or malformed protocol message for the current state.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Key material or authentication parameter decode failures.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Sending on a closed peer queue.
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// Invalid state machine transition.
    #[error("State machine error: {0}")]
    StateMachine(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
