//! Lark Player - Playback Core
//!
//! Backend-agnostic queue and playback state machine for Lark Player.
//!
//! This crate provides:
//! - Ordered queue with an explicit "nothing current" position
//! - Repeat modes (Off, One, Queue)
//! - Shuffle algorithms (Random + Smart)
//! - Playback state machine driven by backend reports
//! - Stale report filtering (per-load generations, per-seek ids)
//! - Backend recreation after fatal errors
//! - Now-playing metadata publishing
//!
//! # Architecture
//!
//! `lark-playback` never touches audio itself:
//! - Decoding and output live behind [`PlayerBackend`]
//! - The OS now-playing surface lives behind [`MetadataSink`]
//! - Artwork fetching lives behind [`ArtworkResolver`]
//!
//! Backends report back through a [`BackendHandle`]; reports are queued on a
//! channel and applied when the host calls
//! [`PlaybackController::process_backend_events`]. Hosts that want a
//! thread of their own can hand the controller to [`PlayerService`].
//!
//! # Example: Basic Playback
//!
//! ```rust
//! use lark_playback::testing::BackendProbe;
//! use lark_playback::{
//!     AudioItem, BackendEvent, BackendState, MemorySink, NowPlayingPublisher,
//!     PlaybackConfig, PlaybackController, PlaybackState, SourceKind,
//! };
//!
//! let probe = BackendProbe::new();
//! let sink = MemorySink::new();
//! let mut controller = PlaybackController::new(
//!     probe.factory(),
//!     NowPlayingPublisher::new(sink.clone()),
//!     PlaybackConfig::default(),
//! );
//!
//! controller.add([
//!     AudioItem::new("/music/one.flac", SourceKind::File)
//!         .with_title("One")
//!         .into_ref(),
//!     AudioItem::new("https://radio.example.com/live", SourceKind::Stream).into_ref(),
//! ]);
//!
//! controller.play().unwrap();
//! assert_eq!(controller.state(), PlaybackState::Loading);
//!
//! // The backend reports back asynchronously
//! probe.emit(BackendEvent::StateChanged(BackendState::Playing));
//! controller.process_backend_events();
//! assert_eq!(controller.state(), PlaybackState::Playing);
//! assert_eq!(sink.info()["title"], lark_playback::NowPlayingValue::Text("One".into()));
//! ```
//!
//! # Example: Shuffle and Repeat
//!
//! ```rust
//! use lark_playback::{Queue, RepeatMode, ShuffleMode};
//!
//! let mut queue = Queue::new();
//!
//! // Enable smart shuffle
//! queue.set_shuffle_mode(ShuffleMode::Smart);
//!
//! // Wrap around at the end of the queue
//! queue.set_repeat_mode(RepeatMode::Queue);
//! ```

mod backend;
mod config;
mod controller;
mod error;
mod events;
mod item;
pub mod navigation;
mod now_playing;
mod queue;
mod service;
mod shuffle;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;

// Public exports
pub use backend::{
    BackendEvent, BackendFactory, BackendHandle, BackendMessage, BackendState, PlayerBackend,
    SeekCompletion,
};
pub use config::{PlaybackConfig, ENV_PREFIX};
pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use events::PlayerEvent;
pub use item::{
    same_item, Artwork, AudioItem, Capability, ItemRef, ResolvedSource, SourceKind,
    TimePitchAlgorithm,
};
pub use now_playing::{
    ArtworkCompletion, ArtworkResolver, InlineArtworkResolver, MemorySink, MetadataSink,
    NowPlayingInfo, NowPlayingKey, NowPlayingPublisher, NowPlayingValue,
};
pub use queue::Queue;
pub use service::{PlayerCommand, PlayerHandle, PlayerService, PlayerStatus};
pub use shuffle::{play_order, play_order_with_rng};
pub use types::{PlaybackState, PositionSnapshot, RepeatMode, ShuffleMode};
