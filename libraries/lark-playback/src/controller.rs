//! Playback controller - the state machine
//!
//! Owns the queue and exactly one backend instance. Public commands are
//! translated into backend commands and return immediately; their outcome
//! arrives later as backend reports, which the host feeds back in through
//! [`PlaybackController::process_backend_events`] on the same control
//! context that issues commands.
//!
//! ```text
//! idle ──play──▶ loading ──▶ ready ──▶ playing ⇄ paused
//!   ▲                                     │ ▲
//!   │                                     ▼ │
//!   └──── stop / queue end / fatal ◀── buffering
//! ```
//!
//! Stale reports are filtered by origin stamp: the backend instance must match
//! and, for item-level reports, so must the load generation. The generation is
//! bumped on every load and every return to idle, which also cancels any seek
//! in flight.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{
    BackendEvent, BackendFactory, BackendHandle, BackendMessage, BackendState, PlayerBackend,
    SeekCompletion,
};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::item::ItemRef;
use crate::now_playing::{NowPlayingInfo, NowPlayingPublisher};
use crate::queue::Queue;
use crate::types::{PlaybackState, PositionSnapshot, RepeatMode, ShuffleMode};

/// Elapsed-time regressions smaller than this are treated as jitter
const TIME_JITTER_SECS: f64 = 0.05;

/// Central playback state machine
pub struct PlaybackController {
    config: PlaybackConfig,

    // State
    state: PlaybackState,
    position: PositionSnapshot,

    /// Whether the user asked for audible playback; `Playing` reports that
    /// contradict it are stale
    wants_playback: bool,

    queue: Queue,

    // Backend
    backend: Box<dyn PlayerBackend>,
    factory: Box<dyn BackendFactory>,
    instance: u64,
    generation: u64,
    callback_tx: Sender<BackendMessage>,
    callback_rx: Receiver<BackendMessage>,

    // Seek bookkeeping
    next_seek_id: u64,
    pending_seek: Option<u64>,

    /// Set between `recreate_backend` and the new instance's `Recreated`
    awaiting_recreation: bool,

    // Settings
    rate: f32,
    volume: f32,
    muted: bool,

    publisher: NowPlayingPublisher,
    pending_events: Vec<PlayerEvent>,
    last_position_event: Option<f64>,
}

impl PlaybackController {
    /// Create a controller and its first backend instance
    ///
    /// Config values that fail [`PlaybackConfig::validate`] fall back to
    /// their defaults.
    pub fn new(
        factory: impl BackendFactory + 'static,
        publisher: NowPlayingPublisher,
        config: PlaybackConfig,
    ) -> Self {
        let config = config.sanitized();
        let (callback_tx, callback_rx) = unbounded();
        let mut factory: Box<dyn BackendFactory> = Box::new(factory);

        let instance = 1;
        let backend = factory.create(BackendHandle::new(callback_tx.clone(), instance, 0));

        let mut controller = Self {
            state: PlaybackState::Idle,
            position: PositionSnapshot::default(),
            wants_playback: false,
            queue: Queue::with_modes(config.repeat, config.shuffle),
            backend,
            factory,
            instance,
            generation: 0,
            callback_tx,
            callback_rx,
            next_seek_id: 0,
            pending_seek: None,
            awaiting_recreation: false,
            rate: config.rate,
            volume: config.volume,
            muted: false,
            publisher,
            pending_events: Vec::new(),
            last_position_event: None,
            config,
        };
        controller.apply_backend_settings();
        controller
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// From idle this loads the current item, or the first one if nothing is
    /// current. Fails with `NoLoadedItem` when the queue is empty.
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Idle => {
                if self.queue.is_empty() {
                    return Err(PlaybackError::NoLoadedItem);
                }
                if self.queue.current_index().is_none() {
                    self.queue.jump(0)?;
                }
                self.load_current(true)
            }
            PlaybackState::Playing => Ok(()),
            PlaybackState::Loading
            | PlaybackState::Ready
            | PlaybackState::Buffering
            | PlaybackState::Paused => {
                self.wants_playback = true;
                self.backend.play();
                Ok(())
            }
        }
    }

    /// Pause playback; no-op unless playing or buffering
    pub fn pause(&mut self) {
        if self.state.is_active() {
            self.wants_playback = false;
            self.backend.pause();
        }
    }

    /// Play if paused or ready, pause if playing
    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.state.is_active() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Stop playback
    ///
    /// Unloads the item but leaves the queue and current index untouched.
    pub fn stop(&mut self) {
        self.backend.stop();
        self.enter_idle();
    }

    /// Skip to the next item, keeping playback running if it was
    pub fn skip_to_next(&mut self) -> Result<()> {
        let resume = self.should_resume();
        self.queue.next()?;
        self.load_current(resume)
    }

    /// Skip to the previous item, keeping playback running if it was
    pub fn skip_to_previous(&mut self) -> Result<()> {
        let resume = self.should_resume();
        self.queue.previous()?;
        self.load_current(resume)
    }

    /// Jump to the item at `index`, keeping playback running if it was
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        let resume = self.should_resume();
        self.queue.jump(index)?;
        self.load_current(resume)
    }

    /// Replace the current item with `item` and load it
    ///
    /// With nothing current the item is appended and becomes current.
    pub fn load(&mut self, item: ItemRef, play_when_ready: bool) -> Result<()> {
        self.queue.replace_current(item);
        self.emit_queue_changed();
        self.load_current(play_when_ready)
    }

    /// Reload the current item, optionally returning to the current position
    pub fn reload(&mut self, start_from_current_time: bool) -> Result<()> {
        if self.queue.current().is_none() {
            return Err(PlaybackError::NoLoadedItem);
        }
        let elapsed = self.position.elapsed;
        let resume = self.should_resume();

        self.load_current(resume)?;
        if start_from_current_time && elapsed > 0.0 {
            self.seek(elapsed)?;
        }
        Ok(())
    }

    /// Seek to `seconds` in the current item
    ///
    /// The state does not change until the backend reports completion. A
    /// newer seek supersedes an older one still in flight.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if self.state == PlaybackState::Idle {
            return Err(PlaybackError::NoLoadedItem);
        }

        let mut target = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        if let Some(duration) = self.position.duration {
            target = target.min(duration);
        }

        self.next_seek_id += 1;
        let seek_id = self.next_seek_id;
        self.pending_seek = Some(seek_id);

        debug!(seek_id, target, "seeking");
        let completion = SeekCompletion::new(self.handle(), seek_id, target);
        self.backend.seek(target, completion);
        Ok(())
    }

    /// Seek relative to the current position
    pub fn seek_by(&mut self, offset: f64) -> Result<()> {
        self.seek(self.position.elapsed + offset)
    }

    // ===== Settings =====

    /// Set playback rate; non-positive rates are ignored
    pub fn set_rate(&mut self, rate: f32) {
        if !(rate.is_finite() && rate > 0.0) {
            warn!(rate, "ignoring invalid playback rate");
            return;
        }
        if (self.rate - rate).abs() < f32::EPSILON {
            return;
        }
        self.rate = rate;
        self.backend.set_rate(rate);
        self.pending_events.push(PlayerEvent::RateChanged { rate });
        self.publish();
    }

    /// Set volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(self.volume);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.backend.set_muted(muted);
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        if self.queue.repeat_mode() != mode {
            self.queue.set_repeat_mode(mode);
            self.pending_events
                .push(PlayerEvent::RepeatModeChanged { mode });
        }
    }

    pub fn set_shuffle_mode(&mut self, mode: ShuffleMode) {
        if self.queue.shuffle_mode() != mode {
            self.queue.set_shuffle_mode(mode);
            self.pending_events
                .push(PlayerEvent::ShuffleModeChanged { mode });
        }
    }

    // ===== Queue Management =====

    /// Append items to the queue
    pub fn add(&mut self, items: impl IntoIterator<Item = ItemRef>) {
        self.queue.append(items);
        self.emit_queue_changed();
    }

    /// Insert items before `index`
    pub fn insert(&mut self, items: impl IntoIterator<Item = ItemRef>, index: usize) -> Result<()> {
        self.queue.insert(items, index)?;
        self.emit_queue_changed();
        Ok(())
    }

    /// Remove the item at `index`
    ///
    /// Removing the current item stops playback.
    pub fn remove_item(&mut self, index: usize) -> Result<ItemRef> {
        let was_current = self.queue.current_index() == Some(index);
        let removed = self.queue.remove(index)?;

        if was_current {
            debug!(index, "removed current item, stopping");
            self.stop();
        }
        self.emit_queue_changed();
        Ok(removed)
    }

    /// Move the item at `from` to `to`
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.queue.move_item(from, to)?;
        self.emit_queue_changed();
        Ok(())
    }

    /// Remove every item after the current one
    pub fn remove_upcoming_items(&mut self) {
        if !self.queue.remove_upcoming().is_empty() {
            self.emit_queue_changed();
        }
    }

    /// Remove every item before the current one
    pub fn remove_previous_items(&mut self) {
        if !self.queue.remove_previous().is_empty() {
            self.emit_queue_changed();
        }
    }

    /// Stop playback and empty the queue
    pub fn clear(&mut self) {
        self.backend.stop();
        self.queue.clear();
        self.enter_idle();
        self.publisher.clear();
        self.emit_queue_changed();
    }

    // ===== Backend Reports =====

    /// Apply every backend report received so far
    ///
    /// Also applies artwork that finished resolving. Returns the number of
    /// backend messages handled (stale ones included).
    pub fn process_backend_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.callback_rx.try_recv() {
            self.handle_backend_message(message);
            handled += 1;
        }
        self.publisher.poll_artwork();
        handled
    }

    /// Apply one backend report
    pub fn handle_backend_message(&mut self, message: BackendMessage) {
        if !self.is_current(&message) {
            trace!(
                instance = message.instance,
                generation = message.generation,
                current_instance = self.instance,
                current_generation = self.generation,
                event = ?message.event,
                "discarding stale backend report"
            );
            return;
        }

        match message.event {
            BackendEvent::StateChanged(state) => self.on_backend_state(state),
            BackendEvent::TimeUpdate(seconds) => self.on_time_update(seconds),
            BackendEvent::DurationUpdate(seconds) => self.on_duration_update(seconds),
            BackendEvent::SeekCompleted {
                seek_id,
                target,
                finished,
            } => self.on_seek_completed(seek_id, target, finished),
            BackendEvent::ItemEnded => self.on_item_ended(),
            BackendEvent::FatalError(message) => self.on_fatal_error(message),
            BackendEvent::Recreated => self.on_backend_recreated(),
        }
    }

    /// Drop the current backend and create a fresh instance
    ///
    /// The new instance is expected to report `Recreated` once it accepts a
    /// load. The current item is then reloaded without autoplay, unless a
    /// command already loaded it on the new instance.
    pub fn recreate_backend(&mut self) {
        self.instance += 1;
        self.generation += 1;
        self.awaiting_recreation = true;
        info!(instance = self.instance, "recreating backend");

        let handle = BackendHandle::new(self.callback_tx.clone(), self.instance, self.generation);
        self.backend = self.factory.create(handle);
        self.apply_backend_settings();
    }

    /// Receiver for backend reports, for hosts that wait on several channels
    pub fn backend_events(&self) -> Receiver<BackendMessage> {
        self.callback_rx.clone()
    }

    // ===== State Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn current_item(&self) -> Option<&ItemRef> {
        self.queue.current()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }

    pub fn position(&self) -> &PositionSnapshot {
        &self.position
    }

    pub fn elapsed(&self) -> f64 {
        self.position.elapsed
    }

    pub fn duration(&self) -> Option<f64> {
        self.position.duration
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.queue.repeat_mode()
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.queue.shuffle_mode()
    }

    /// Load generation; bumped on every load and every return to idle
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Id of the backend instance currently in use
    pub fn backend_instance(&self) -> u64 {
        self.instance
    }

    /// Whether a seek is waiting for completion
    pub fn is_seeking(&self) -> bool {
        self.pending_seek.is_some()
    }

    /// Last snapshot published to the now-playing sink
    pub fn now_playing(&self) -> Option<&NowPlayingInfo> {
        self.publisher.info()
    }

    /// Take the events queued since the last call
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ===== Internals =====

    fn load_current(&mut self, play_when_ready: bool) -> Result<()> {
        let (Some(index), Some(item)) = (self.queue.current_index(), self.queue.current().cloned())
        else {
            return Err(PlaybackError::NoLoadedItem);
        };

        self.generation += 1;
        self.pending_seek = None;

        if let Err(err) = item.resolve_source() {
            debug!(source = %item.source_url, %err, "cannot load item");
            self.backend.stop();
            self.enter_idle();
            return Err(err);
        }

        info!(index, source = %item.source_url, play_when_ready, "loading item");
        self.wants_playback = play_when_ready;
        self.position = PositionSnapshot::for_item(item.clone());
        self.last_position_event = None;
        self.pending_events.push(PlayerEvent::ItemChanged {
            index,
            source_url: item.source_url.clone(),
        });
        self.set_state(PlaybackState::Loading);
        // Replacing an item mid-load leaves the state unchanged
        self.publish();

        let handle = self.handle();
        if let Err(err) = self.backend.load(&item, play_when_ready, handle) {
            debug!(source = %item.source_url, %err, "backend rejected item");
            self.enter_idle();
            return Err(err);
        }
        Ok(())
    }

    fn on_backend_state(&mut self, state: BackendState) {
        match state {
            BackendState::Playing | BackendState::Buffering if !self.wants_playback => {
                trace!(?state, "ignoring playback report after pause");
            }
            BackendState::Idle => {
                if self.state != PlaybackState::Idle {
                    debug!("backend went idle");
                    self.enter_idle();
                }
            }
            _ => self.set_state(state.into()),
        }
    }

    fn on_time_update(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            return;
        }
        if self.pending_seek.is_some() {
            trace!(seconds, "ignoring time update during seek");
            return;
        }
        if seconds + TIME_JITTER_SECS < self.position.elapsed {
            trace!(
                seconds,
                elapsed = self.position.elapsed,
                "ignoring elapsed time regression"
            );
            return;
        }

        self.position.elapsed = seconds;
        self.publish();
        self.emit_position(false);
    }

    fn on_duration_update(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 || self.position.duration == Some(seconds) {
            return;
        }
        self.position.duration = Some(seconds);
        self.pending_events
            .push(PlayerEvent::DurationChanged { duration: seconds });
        self.publish();
    }

    fn on_seek_completed(&mut self, seek_id: u64, target: f64, finished: bool) {
        if self.pending_seek != Some(seek_id) {
            trace!(seek_id, "ignoring superseded seek completion");
            return;
        }
        self.pending_seek = None;

        if finished {
            self.position.elapsed = target;
        }
        self.pending_events
            .push(PlayerEvent::SeekCompleted { target, finished });
        self.publish();
        self.emit_position(true);
    }

    fn on_item_ended(&mut self) {
        debug!(index = ?self.queue.current_index(), "item ended");
        if !self.config.auto_advance {
            self.finish_queue();
            return;
        }

        match self.queue.next() {
            Ok(_) => {
                if let Err(err) = self.load_current(true) {
                    warn!(%err, "failed to load next item");
                    self.pending_events.push(PlayerEvent::Error {
                        message: err.to_string(),
                    });
                }
            }
            Err(_) => self.finish_queue(),
        }
    }

    fn on_fatal_error(&mut self, message: String) {
        error!(%message, instance = self.instance, "backend failed");
        self.enter_idle();
        self.pending_events.push(PlayerEvent::Error { message });

        if self.config.recreate_on_fatal_error {
            self.recreate_backend();
        }
    }

    fn on_backend_recreated(&mut self) {
        info!(instance = self.instance, "backend ready after recreation");
        self.pending_events.push(PlayerEvent::BackendRecreated);

        let requested = std::mem::take(&mut self.awaiting_recreation);
        if self.queue.current().is_none() {
            return;
        }

        let play_when_ready = if requested {
            // A command since the failure already loaded the item
            if self.state != PlaybackState::Idle {
                debug!(state = ?self.state, "item already reloaded");
                return;
            }
            false
        } else {
            self.should_resume()
        };

        if let Err(err) = self.load_current(play_when_ready) {
            warn!(%err, "failed to reload item after recreation");
            self.pending_events.push(PlayerEvent::Error {
                message: err.to_string(),
            });
        }
    }

    /// End of queue: quietly return to idle
    fn finish_queue(&mut self) {
        info!("reached end of queue");
        self.backend.stop();
        self.enter_idle();
        self.pending_events.push(PlayerEvent::QueueEnded);
    }

    fn enter_idle(&mut self) {
        self.generation += 1;
        self.pending_seek = None;
        self.wants_playback = false;
        self.position = PositionSnapshot::default();
        self.last_position_event = None;
        self.set_state(PlaybackState::Idle);
        // Publish even if already idle so the sink is cleared
        self.publish();
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "state changed");
        self.state = state;
        self.pending_events.push(PlayerEvent::StateChanged { state });
        self.publish();
    }

    fn publish(&mut self) {
        self.publisher.publish(self.state, &self.position, self.rate);
    }

    fn emit_position(&mut self, force: bool) {
        let elapsed = self.position.elapsed;
        let due = force
            || match self.last_position_event {
                Some(last) => (elapsed - last).abs() >= self.config.position_event_interval,
                None => true,
            };
        if due {
            self.last_position_event = Some(elapsed);
            self.pending_events.push(PlayerEvent::PositionUpdated {
                elapsed,
                duration: self.position.duration,
            });
        }
    }

    fn emit_queue_changed(&mut self) {
        self.pending_events.push(PlayerEvent::QueueChanged {
            length: self.queue.len(),
            current_index: self.queue.current_index(),
        });
    }

    fn should_resume(&self) -> bool {
        self.state.is_active() || (self.state == PlaybackState::Loading && self.wants_playback)
    }

    fn is_current(&self, message: &BackendMessage) -> bool {
        message.instance == self.instance
            && (message.event.is_instance_level() || message.generation == self.generation)
    }

    fn handle(&self) -> BackendHandle {
        BackendHandle::new(self.callback_tx.clone(), self.instance, self.generation)
    }

    fn apply_backend_settings(&mut self) {
        self.backend.set_rate(self.rate);
        self.backend.set_volume(self.volume);
        self.backend.set_muted(self.muted);
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("position", &self.position)
            .field("queue", &self.queue)
            .field("instance", &self.instance)
            .field("generation", &self.generation)
            .field("pending_seek", &self.pending_seek)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{AudioItem, SourceKind};
    use crate::now_playing::MemorySink;
    use crate::testing::{BackendCommand, BackendProbe};

    fn create_test_item(name: &str) -> ItemRef {
        AudioItem::new(format!("/music/{}.mp3", name), SourceKind::File)
            .with_title(name)
            .into_ref()
    }

    fn controller() -> (PlaybackController, BackendProbe) {
        let probe = BackendProbe::new();
        let controller = PlaybackController::new(
            probe.factory(),
            NowPlayingPublisher::new(MemorySink::new()),
            PlaybackConfig::default(),
        );
        (controller, probe)
    }

    #[test]
    fn starts_idle() {
        let (controller, probe) = controller();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.backend_instance(), 1);
        assert_eq!(probe.instances_created(), 1);
    }

    #[test]
    fn pause_is_noop_when_not_playing() {
        let (mut controller, probe) = controller();
        probe.take_commands();
        controller.pause();
        assert!(probe.commands().is_empty());
    }

    #[test]
    fn play_while_ready_forwards_to_backend() {
        let (mut controller, probe) = controller();
        controller.add([create_test_item("A")]);
        controller.jump_to(0).unwrap();
        probe.emit(BackendEvent::StateChanged(BackendState::Ready));
        controller.process_backend_events();
        assert_eq!(controller.state(), PlaybackState::Ready);

        probe.take_commands();
        controller.play().unwrap();
        assert_eq!(probe.commands(), vec![BackendCommand::Play]);
    }

    #[test]
    fn stop_keeps_queue_position() {
        let (mut controller, probe) = controller();
        controller.add([create_test_item("A"), create_test_item("B")]);
        controller.jump_to(1).unwrap();
        probe.emit(BackendEvent::StateChanged(BackendState::Ready));
        controller.process_backend_events();

        controller.stop();
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(controller.queue().len(), 2);
        assert_eq!(probe.last_command(), Some(BackendCommand::Stop));
    }

    #[test]
    fn invalid_source_fails_synchronously() {
        let (mut controller, _probe) = controller();
        controller.add([AudioItem::new("", SourceKind::Stream).into_ref()]);

        let err = controller.play().unwrap_err();
        assert_eq!(err, PlaybackError::InvalidSourceUrl(String::new()));
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn rate_is_validated_and_forwarded() {
        let (mut controller, probe) = controller();
        probe.take_commands();

        controller.set_rate(-1.0);
        assert!(probe.commands().is_empty());

        controller.set_rate(1.5);
        assert_eq!(controller.rate(), 1.5);
        assert_eq!(probe.commands(), vec![BackendCommand::SetRate(1.5)]);
    }

    #[test]
    fn repeat_and_shuffle_events() {
        let (mut controller, _probe) = controller();
        controller.set_repeat_mode(RepeatMode::Queue);
        controller.set_repeat_mode(RepeatMode::Queue);
        controller.set_shuffle_mode(ShuffleMode::Random);

        let events = controller.drain_events();
        assert_eq!(
            events,
            vec![
                PlayerEvent::RepeatModeChanged {
                    mode: RepeatMode::Queue
                },
                PlayerEvent::ShuffleModeChanged {
                    mode: ShuffleMode::Random
                },
            ]
        );
    }
}
