//! Shared error definitions for the listener.

use std::path::PathBuf;

use crate::protocol::ProtocolError;
use crate::session::SessionId;

//--------------------------------------------------------------------------------------------------
// Types: Error
//--------------------------------------------------------------------------------------------------

/// Listener error types.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session closed: {0}")]
    SessionClosed(SessionId),

    #[error("Maximum sessions reached ({0})")]
    MaxSessionsReached(usize),

    #[error("{source} ({})", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source} ({})", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ListenerError {
    /// Get the error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "BIND_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::MaxSessionsReached(_) => "MAX_SESSIONS",
            Self::FileRead { .. } => "FILE_READ",
            Self::FileWrite { .. } => "FILE_WRITE",
            Self::InvalidFileName(_) => "INVALID_FILE_NAME",
            Self::Config(_) => "INVALID_CONFIG",
        }
    }
}

/// Result type for listener operations.
pub type Result<T> = std::result::Result<T, ListenerError>;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
