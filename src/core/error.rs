use thiserror::Error;

/// Failure categories of the scoring client.
///
/// None of these are fatal: each is contained by the context that detects it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GuardError {
    /// Long-lived channel failed to open, write or stay open. Triggers a reconnect.
    #[error("channel transport failed: {0}")]
    Transport(String),

    /// Stateless request returned a non-success status or could not be sent.
    #[error("stateless request failed: {0}")]
    RequestFailure(String),

    /// Inbound message could not be decoded or lacks a submission identifier.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The frame source could not produce pixels (e.g. a tainted source).
    #[error("capture degraded: {0}")]
    CaptureDegraded(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for GuardError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GuardError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        GuardError::RequestFailure(err.to_string())
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::MalformedReply(err.to_string())
    }
}
