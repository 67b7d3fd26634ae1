//! Backend adapter contract
//!
//! The controller drives a media backend through [`PlayerBackend`] and the
//! backend reports back through a [`BackendHandle`]. Reports are messages, not
//! calls: they travel over a channel that only the control context drains, so
//! a backend may raise them from its own decode/output threads.
//!
//! Every message is stamped with the backend instance and the load generation
//! of the handle that sent it. Handles are minted by the controller per load,
//! which is what lets it discard reports about an item it has moved away from.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::ItemRef;

/// States a backend can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    /// An asset is being loaded
    Loading,

    /// Item loaded, ready to start
    Ready,

    /// Playing but starved for data
    Buffering,

    /// Paused
    Paused,

    /// Playing
    Playing,

    /// Nothing loaded
    Idle,
}

/// Report raised by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Backend-observed state changed
    StateChanged(BackendState),

    /// Periodic elapsed time while playing (seconds)
    TimeUpdate(f64),

    /// Duration became known or changed (seconds)
    DurationUpdate(f64),

    /// A seek issued by the controller finished
    SeekCompleted {
        /// Id of the seek request this completes
        seek_id: u64,
        /// Requested position (seconds)
        target: f64,
        /// `false` if the seek was interrupted
        finished: bool,
    },

    /// Current item played to its end
    ItemEnded,

    /// The backend instance is unusable
    FatalError(String),

    /// The backend replaced its engine and accepts a fresh load
    Recreated,
}

impl BackendEvent {
    /// Events about the backend instance rather than the loaded item
    pub fn is_instance_level(&self) -> bool {
        matches!(self, BackendEvent::FatalError(_) | BackendEvent::Recreated)
    }
}

/// Event plus the origin stamp used to filter stale reports
#[derive(Debug, Clone, PartialEq)]
pub struct BackendMessage {
    /// Backend instance that raised the event
    pub instance: u64,

    /// Load generation the raising handle was minted for
    pub generation: u64,

    pub event: BackendEvent,
}

/// Callback side of the contract, safe to use from any thread
///
/// All `send`-style methods return `false` once the controller is gone.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    tx: Sender<BackendMessage>,
    instance: u64,
    generation: u64,
}

impl BackendHandle {
    pub(crate) fn new(tx: Sender<BackendMessage>, instance: u64, generation: u64) -> Self {
        Self {
            tx,
            instance,
            generation,
        }
    }

    /// Backend instance this handle belongs to
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Load generation this handle was minted for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state_changed(&self, state: BackendState) -> bool {
        self.send(BackendEvent::StateChanged(state))
    }

    pub fn time_update(&self, seconds: f64) -> bool {
        self.send(BackendEvent::TimeUpdate(seconds))
    }

    pub fn duration_update(&self, seconds: f64) -> bool {
        self.send(BackendEvent::DurationUpdate(seconds))
    }

    pub fn item_ended(&self) -> bool {
        self.send(BackendEvent::ItemEnded)
    }

    pub fn fatal_error(&self, message: impl Into<String>) -> bool {
        self.send(BackendEvent::FatalError(message.into()))
    }

    pub fn recreated(&self) -> bool {
        self.send(BackendEvent::Recreated)
    }

    /// Raise an arbitrary event
    pub fn send(&self, event: BackendEvent) -> bool {
        self.tx
            .send(BackendMessage {
                instance: self.instance,
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// One-shot completion for a seek request
///
/// Dropping it unanswered reports the seek as interrupted.
#[derive(Debug)]
pub struct SeekCompletion {
    /// `None` once answered
    handle: Option<BackendHandle>,
    seek_id: u64,
    target: f64,
}

impl SeekCompletion {
    pub(crate) fn new(handle: BackendHandle, seek_id: u64, target: f64) -> Self {
        Self {
            handle: Some(handle),
            seek_id,
            target,
        }
    }

    /// Requested position (seconds)
    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn seek_id(&self) -> u64 {
        self.seek_id
    }

    /// Report the outcome of the seek
    pub fn complete(mut self, finished: bool) -> bool {
        self.send(finished)
    }

    fn send(&mut self, finished: bool) -> bool {
        self.handle.take().is_some_and(|handle| {
            handle.send(BackendEvent::SeekCompleted {
                seek_id: self.seek_id,
                target: self.target,
                finished,
            })
        })
    }
}

impl Drop for SeekCompletion {
    fn drop(&mut self) {
        self.send(false);
    }
}

/// Command side of the contract
///
/// Commands must not block: outcomes are reported later through the handle
/// passed to [`PlayerBackend::load`]. Commands other than `load` are no-ops
/// while nothing is loaded.
pub trait PlayerBackend: Send {
    /// Open `item` and start it once ready if `play_when_ready`
    ///
    /// Fails with `InvalidSourceUrl` when the locator cannot be resolved.
    /// All reports about this item must go through `handle`.
    fn load(&mut self, item: &ItemRef, play_when_ready: bool, handle: BackendHandle)
        -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Stop and unload the current item
    fn stop(&mut self);

    /// Seek to `to` seconds, reporting through `completion`
    fn seek(&mut self, to: f64, completion: SeekCompletion);

    fn set_rate(&mut self, rate: f32);

    /// Linear volume, 0.0 to 1.0
    fn set_volume(&mut self, _volume: f32) {}

    fn set_muted(&mut self, _muted: bool) {}
}

/// Creates backend instances
///
/// `handle` carries the new instance id; the backend uses it for
/// instance-level reports such as [`BackendEvent::Recreated`].
pub trait BackendFactory: Send {
    fn create(&mut self, handle: BackendHandle) -> Box<dyn PlayerBackend>;
}

impl<F> BackendFactory for F
where
    F: FnMut(BackendHandle) -> Box<dyn PlayerBackend> + Send,
{
    fn create(&mut self, handle: BackendHandle) -> Box<dyn PlayerBackend> {
        self(handle)
    }
}
