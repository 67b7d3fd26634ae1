//! Player events
//!
//! Events are queued by the controller while it handles a command or a
//! backend report, and drained by the host with
//! [`PlaybackController::drain_events`](crate::PlaybackController::drain_events).

use serde::{Deserialize, Serialize};

use crate::types::{PlaybackState, RepeatMode, ShuffleMode};

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Observable playback state changed
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// A different item became current and started loading
    ItemChanged {
        /// Queue index of the new item
        index: usize,
        /// Source locator of the new item
        source_url: String,
    },

    /// Elapsed time changed
    PositionUpdated {
        elapsed: f64,
        duration: Option<f64>,
    },

    /// Duration became known or changed
    DurationChanged { duration: f64 },

    /// A seek finished (or was interrupted)
    SeekCompleted { target: f64, finished: bool },

    /// Last item ended with nothing left to play
    QueueEnded,

    /// Items were added, removed or reordered
    QueueChanged {
        /// New queue length
        length: usize,
        /// Current index after the change
        current_index: Option<usize>,
    },

    RepeatModeChanged { mode: RepeatMode },

    ShuffleModeChanged { mode: ShuffleMode },

    /// Playback rate changed
    RateChanged { rate: f32 },

    /// The backend failed; playback stopped for the current item
    Error {
        /// Error message
        message: String,
    },

    /// A fresh backend instance took over
    BackendRecreated,
}

impl PlayerEvent {
    /// Whether this event carries a failure
    pub fn is_error(&self) -> bool {
        matches!(self, PlayerEvent::Error { .. })
    }
}
