//! Error types for mailpush.

/// Errors surfaced by the session entry points.
///
/// Every variant is terminal for a single command only — the session
/// stays valid and the client may retry with a new RCPT or message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("recipient rejected: {0}")]
    Recipient(#[from] RecipientError),

    #[error("message rejected: {0}")]
    Data(#[from] DataError),

    #[error("bad sequence of commands: {command} not valid in state {state}")]
    BadSequence {
        command: &'static str,
        state: &'static str,
    },
}

/// Recipient resolution failures (RCPT rejection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecipientError {
    #[error("address domain does not match {expected}")]
    DomainMismatch { expected: String },

    #[error("address is missing the {expected} prefix")]
    PrefixMismatch { expected: String },

    #[error("invalid topic name: {topic:?}")]
    InvalidTopic { topic: String },

    #[error("malformed recipient address: {0}")]
    MalformedAddress(String),
}

/// Message handling failures (DATA rejection, nothing dispatched).
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("malformed MIME message")]
    Parse,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Downstream publish failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("publish to topic {topic} failed with status {status}")]
    Rejected { topic: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Listener/connection failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
