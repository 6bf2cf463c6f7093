use termgate_protocol::SessionState;
use thiserror::Error;

/// Errors surfaced by the session registry
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to start session '{id}': {reason}")]
    SpawnFailed { id: String, reason: String },

    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' is already attached")]
    AlreadyAttached(String),

    #[error("session '{0}' is closed")]
    SessionClosed(String),

    #[error("session '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: SessionState,
        to: SessionState,
    },

    #[error("maximum concurrent sessions ({0}) reached")]
    CapacityReached(usize),

    #[error("bridge I/O failed for session '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
}
