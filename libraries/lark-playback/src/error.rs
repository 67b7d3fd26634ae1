//! Error types for playback management

use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The item's source locator cannot be resolved to something playable
    #[error("Invalid source url: {0}")]
    InvalidSourceUrl(String),

    /// A playback command was issued while nothing is loaded
    #[error("No item loaded")]
    NoLoadedItem,

    /// Queue has no previous item under the current repeat mode
    #[error("No previous item in queue")]
    NoPreviousItem,

    /// Queue has no next item under the current repeat mode
    #[error("No next item in queue")]
    NoNextItem,

    /// Queue index out of bounds
    #[error("Invalid index {index}: {reason}")]
    InvalidIndex {
        /// Offending index
        index: usize,
        /// Why the index was rejected
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// The playback service thread has shut down
    #[error("Playback service stopped")]
    ServiceStopped,
}

impl PlaybackError {
    pub(crate) fn invalid_index(index: usize, reason: impl Into<String>) -> Self {
        PlaybackError::InvalidIndex {
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error describes a queue boundary rather than a failure
    pub fn is_queue_boundary(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoNextItem | PlaybackError::NoPreviousItem
        )
    }
}

impl From<config::ConfigError> for PlaybackError {
    fn from(err: config::ConfigError) -> Self {
        PlaybackError::Config(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
