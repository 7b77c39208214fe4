//! Error types for the sync coordinator.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed protocol payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer rejected the request.
    #[error("peer error: {0}")]
    PeerError(String),

    /// Local database error while draining or applying.
    #[error("database error: {0}")]
    Database(#[from] rowlog_core::CoreError),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// A sync cycle was started while another was active.
    #[error("sync already in progress (state {state})")]
    AlreadySyncing {
        /// The coordinator state at the time.
        state: String,
    },

    /// Transport is not connected.
    #[error("not connected to peer")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the operation can be retried.
    ///
    /// Local database errors are never retried: replay would observe the
    /// same state, and primary-key or schema violations signal bugs.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::PeerError(_) => true,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}
