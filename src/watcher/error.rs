//! Error types for the watch registry and its session plumbing.

use thiserror::Error;

/// Errors from watch registry and session operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Session not supplied, not supported")]
    SessionNotSupplied,

    #[error("No session bound; call create() or set_session() first")]
    SessionNotBound,

    #[error("Watch ids exhausted")]
    IdsExhausted,

    #[error("Protocol handler already exists for command \"{command}\"")]
    HandlerAlreadyRegistered { command: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Unrecognized JSON command: {command}")]
    UnknownCommand { command: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
