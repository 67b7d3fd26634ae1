//! Core types for playback management

use serde::{Deserialize, Serialize};

use crate::backend::BackendState;
use crate::item::ItemRef;

/// Observable playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No item loaded
    #[default]
    Idle,

    /// An item is being loaded by the backend
    Loading,

    /// Item loaded, ready to start
    Ready,

    /// Playing, but waiting for data
    Buffering,

    /// Currently playing
    Playing,

    /// Paused mid-item
    Paused,
}

impl PlaybackState {
    /// Whether an item is loaded in this state
    pub fn has_item(self) -> bool {
        self != PlaybackState::Idle
    }

    /// Whether audio is (or is about to be) audible
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Buffering)
    }
}

impl From<BackendState> for PlaybackState {
    fn from(state: BackendState) -> Self {
        match state {
            BackendState::Idle => PlaybackState::Idle,
            BackendState::Loading => PlaybackState::Loading,
            BackendState::Ready => PlaybackState::Ready,
            BackendState::Buffering => PlaybackState::Buffering,
            BackendState::Playing => PlaybackState::Playing,
            BackendState::Paused => PlaybackState::Paused,
        }
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the queue
    #[default]
    Off,

    /// Loop the current item only
    One,

    /// Loop the entire queue
    Queue,
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Sequential order
    #[default]
    Off,

    /// Uniform random permutation
    Random,

    /// Random permutation that spreads artists apart
    Smart,
}

impl ShuffleMode {
    /// Whether navigation follows a permutation
    pub fn is_enabled(self) -> bool {
        self != ShuffleMode::Off
    }
}

/// Elapsed time, duration and active item at one point in time
#[derive(Debug, Clone, Default)]
pub struct PositionSnapshot {
    /// Elapsed seconds in the active item
    pub elapsed: f64,

    /// Total seconds, once the backend has reported it
    pub duration: Option<f64>,

    /// The item the position refers to
    pub item: Option<ItemRef>,
}

impl PositionSnapshot {
    /// Fresh snapshot for a newly loaded item
    pub(crate) fn for_item(item: ItemRef) -> Self {
        Self {
            elapsed: item.initial_time.unwrap_or(0.0).max(0.0),
            duration: None,
            item: Some(item),
        }
    }

    /// Elapsed time as a fraction of the duration, if known
    pub fn progress(&self) -> Option<f64> {
        match self.duration {
            Some(duration) if duration > 0.0 => Some((self.elapsed / duration).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{AudioItem, SourceKind};

    #[test]
    fn defaults() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
        assert_eq!(RepeatMode::default(), RepeatMode::Off);
        assert!(!ShuffleMode::default().is_enabled());
    }

    #[test]
    fn backend_states_map_one_to_one() {
        assert_eq!(
            PlaybackState::from(BackendState::Buffering),
            PlaybackState::Buffering
        );
        assert_eq!(PlaybackState::from(BackendState::Idle), PlaybackState::Idle);
        assert!(!PlaybackState::Idle.has_item());
        assert!(PlaybackState::Buffering.is_active());
    }

    #[test]
    fn snapshot_starts_at_initial_time() {
        let item = AudioItem::new("/music/a.flac", SourceKind::File)
            .with_initial_time(12.5)
            .into_ref();
        let snapshot = PositionSnapshot::for_item(item);
        assert_eq!(snapshot.elapsed, 12.5);
        assert_eq!(snapshot.duration, None);
        assert_eq!(snapshot.progress(), None);
    }

    #[test]
    fn progress_is_clamped() {
        let snapshot = PositionSnapshot {
            elapsed: 250.0,
            duration: Some(200.0),
            item: None,
        };
        assert_eq!(snapshot.progress(), Some(1.0));
    }
}
