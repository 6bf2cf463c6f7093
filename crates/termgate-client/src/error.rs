use termgate_protocol::FrameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unknown tab '{0}'")]
    UnknownTab(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("tab '{0}' is not connected")]
    NotConnected(String),

    #[error("failed to send on connection: {0}")]
    Send(String),

    #[error("failed to encode control frame: {0}")]
    Encode(#[from] FrameError),

    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),
}
