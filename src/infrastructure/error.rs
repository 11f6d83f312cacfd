//! Store-boundary errors

use thiserror::Error;

/// Failures reported by a [`ConfigStore`](crate::infrastructure::traits::ConfigStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The token presented on write no longer matches the stored document.
    #[error("stale concurrency token {token}")]
    Conflict { token: String },

    #[error("transport failure: {message}")]
    Transport { status: Option<u16>, message: String },
}

impl StoreError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Create a transport error from an I/O failure with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::transport(format!("{}: {}", context.into(), source))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
