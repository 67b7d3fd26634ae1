//! Threaded playback service
//!
//! Runs a [`PlaybackController`] on its own thread. Commands from any number
//! of [`PlayerHandle`]s and reports from the backend are interleaved on that
//! one thread, so the controller never needs a lock.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::controller::PlaybackController;
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::item::ItemRef;
use crate::types::{PlaybackState, RepeatMode, ShuffleMode};

/// Events buffered for subscribers before new ones are dropped
const EVENT_CAPACITY: usize = 256;

/// Wake-up interval for applying artwork resolved off-thread
const IDLE_TICK: Duration = Duration::from_millis(100);

/// Commands accepted by the service
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    SkipToNext,
    SkipToPrevious,

    /// Jump to a queue index
    JumpTo(usize),

    /// Seek to position (in seconds)
    Seek(f64),

    /// Replace the current item and load it
    Load {
        item: ItemRef,
        play_when_ready: bool,
    },

    Reload {
        start_from_current_time: bool,
    },

    /// Append items to the queue
    Add(Vec<ItemRef>),

    /// Insert items before an index
    Insert { items: Vec<ItemRef>, index: usize },

    Move { from: usize, to: usize },
    RemoveUpcoming,
    RemovePrevious,
    ClearQueue,

    SetRate(f32),

    /// Set volume (0.0-1.0)
    SetVolume(f32),

    SetMuted(bool),
    SetRepeat(RepeatMode),
    SetShuffle(ShuffleMode),
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub current_index: Option<usize>,
    pub queue_length: usize,
    pub elapsed: f64,
    pub duration: Option<f64>,
    pub rate: f32,
    pub volume: f32,
    pub muted: bool,
    pub repeat: RepeatMode,
    pub shuffle: ShuffleMode,
}

impl PlayerStatus {
    fn capture(controller: &PlaybackController) -> Self {
        Self {
            state: controller.state(),
            current_index: controller.current_index(),
            queue_length: controller.queue().len(),
            elapsed: controller.elapsed(),
            duration: controller.duration(),
            rate: controller.rate(),
            volume: controller.volume(),
            muted: controller.is_muted(),
            repeat: controller.repeat_mode(),
            shuffle: controller.shuffle_mode(),
        }
    }
}

enum Request {
    Command(PlayerCommand, Sender<Result<()>>),
    Remove(usize, Sender<Result<ItemRef>>),
    Status(Sender<PlayerStatus>),
    Shutdown,
}

/// Cloneable client for a running [`PlayerService`]
///
/// Every method waits for the service thread to apply the command and
/// returns its result. Fails with `ServiceStopped` once the service is gone.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: Sender<Request>,
}

impl PlayerHandle {
    /// Apply `command` on the service thread
    pub fn send(&self, command: PlayerCommand) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request(Request::Command(command, reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)?
    }

    pub fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause)
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(PlayerCommand::TogglePlayPause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.send(PlayerCommand::SkipToNext)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.send(PlayerCommand::SkipToPrevious)
    }

    pub fn jump_to(&self, index: usize) -> Result<()> {
        self.send(PlayerCommand::JumpTo(index))
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(PlayerCommand::Seek(seconds))
    }

    pub fn load(&self, item: ItemRef, play_when_ready: bool) -> Result<()> {
        self.send(PlayerCommand::Load {
            item,
            play_when_ready,
        })
    }

    pub fn add(&self, items: Vec<ItemRef>) -> Result<()> {
        self.send(PlayerCommand::Add(items))
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.send(PlayerCommand::ClearQueue)
    }

    /// Remove the item at `index`, stopping playback if it is current
    pub fn remove_item(&self, index: usize) -> Result<ItemRef> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request(Request::Remove(index, reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)?
    }

    pub fn status(&self) -> Result<PlayerStatus> {
        let (reply_tx, reply_rx) = bounded(1);
        self.request(Request::Status(reply_tx))?;
        reply_rx.recv().map_err(|_| PlaybackError::ServiceStopped)
    }

    fn request(&self, request: Request) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| PlaybackError::ServiceStopped)
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle").finish_non_exhaustive()
    }
}

/// A controller running on a dedicated thread
pub struct PlayerService {
    handle: PlayerHandle,
    events: Receiver<PlayerEvent>,
    thread: Option<JoinHandle<PlaybackController>>,
}

impl PlayerService {
    /// Move `controller` onto a new thread and start serving commands
    pub fn spawn(controller: PlaybackController) -> Self {
        let (request_tx, request_rx) = unbounded();
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);

        let thread = thread::spawn(move || run(controller, &request_rx, &event_tx));
        info!("playback service started");

        Self {
            handle: PlayerHandle { tx: request_tx },
            events: event_rx,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    /// Events emitted by the controller
    ///
    /// Clones of the receiver share one stream; each event is delivered once.
    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events
    }

    /// Stop playback, end the thread and hand the controller back
    pub fn shutdown(mut self) -> Result<PlaybackController> {
        // Ignore send errors: the thread may already be gone
        let _ = self.handle.tx.send(Request::Shutdown);
        self.thread
            .take()
            .ok_or(PlaybackError::ServiceStopped)?
            .join()
            .map_err(|_| PlaybackError::ServiceStopped)
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.tx.send(Request::Shutdown);
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

fn run(
    mut controller: PlaybackController,
    requests: &Receiver<Request>,
    events: &Sender<PlayerEvent>,
) -> PlaybackController {
    let backend_events = controller.backend_events();

    loop {
        select! {
            recv(requests) -> request => match request {
                Ok(Request::Command(command, reply)) => {
                    let _ = reply.send(execute(&mut controller, command));
                }
                Ok(Request::Remove(index, reply)) => {
                    let _ = reply.send(controller.remove_item(index));
                }
                Ok(Request::Status(reply)) => {
                    let _ = reply.send(PlayerStatus::capture(&controller));
                }
                Ok(Request::Shutdown) | Err(_) => break,
            },
            recv(backend_events) -> message => {
                if let Ok(message) = message {
                    controller.handle_backend_message(message);
                }
            },
            default(IDLE_TICK) => {}
        }

        controller.process_backend_events();
        forward_events(&mut controller, events);
    }

    controller.stop();
    forward_events(&mut controller, events);
    info!("playback service stopped");
    controller
}

fn execute(controller: &mut PlaybackController, command: PlayerCommand) -> Result<()> {
    debug!(?command, "executing command");
    match command {
        PlayerCommand::Play => controller.play(),
        PlayerCommand::Pause => {
            controller.pause();
            Ok(())
        }
        PlayerCommand::TogglePlayPause => controller.toggle_play_pause(),
        PlayerCommand::Stop => {
            controller.stop();
            Ok(())
        }
        PlayerCommand::SkipToNext => controller.skip_to_next(),
        PlayerCommand::SkipToPrevious => controller.skip_to_previous(),
        PlayerCommand::JumpTo(index) => controller.jump_to(index),
        PlayerCommand::Seek(seconds) => controller.seek(seconds),
        PlayerCommand::Load {
            item,
            play_when_ready,
        } => controller.load(item, play_when_ready),
        PlayerCommand::Reload {
            start_from_current_time,
        } => controller.reload(start_from_current_time),
        PlayerCommand::Add(items) => {
            controller.add(items);
            Ok(())
        }
        PlayerCommand::Insert { items, index } => controller.insert(items, index),
        PlayerCommand::Move { from, to } => controller.move_item(from, to),
        PlayerCommand::RemoveUpcoming => {
            controller.remove_upcoming_items();
            Ok(())
        }
        PlayerCommand::RemovePrevious => {
            controller.remove_previous_items();
            Ok(())
        }
        PlayerCommand::ClearQueue => {
            controller.clear();
            Ok(())
        }
        PlayerCommand::SetRate(rate) => {
            controller.set_rate(rate);
            Ok(())
        }
        PlayerCommand::SetVolume(volume) => {
            controller.set_volume(volume);
            Ok(())
        }
        PlayerCommand::SetMuted(muted) => {
            controller.set_muted(muted);
            Ok(())
        }
        PlayerCommand::SetRepeat(mode) => {
            controller.set_repeat_mode(mode);
            Ok(())
        }
        PlayerCommand::SetShuffle(mode) => {
            controller.set_shuffle_mode(mode);
            Ok(())
        }
    }
}

fn forward_events(controller: &mut PlaybackController, events: &Sender<PlayerEvent>) {
    for event in controller.drain_events() {
        match events.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event buffer full, dropping event");
            }
        }
    }
}
