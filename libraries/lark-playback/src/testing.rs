//! Scripted backend for tests and demos
//!
//! [`ScriptedBackend`] does no audio work. It records every command it
//! receives and keeps the handles the controller gave it, so a test can play
//! the part of a real engine by emitting reports at chosen moments through a
//! [`BackendProbe`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{
    BackendEvent, BackendFactory, BackendHandle, PlayerBackend, SeekCompletion,
};
use crate::error::Result;
use crate::item::ItemRef;

/// Command received by a scripted backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Load {
        source_url: String,
        play_when_ready: bool,
        generation: u64,
    },
    Play,
    Pause,
    Stop,
    Seek {
        to: f64,
        seek_id: u64,
    },
    SetRate(f32),
    SetVolume(f32),
    SetMuted(bool),
}

#[derive(Debug, Default)]
struct ProbeState {
    commands: Vec<BackendCommand>,
    /// Handle from each `load`, oldest first
    load_handles: Vec<BackendHandle>,
    /// Handle from each `create`, oldest first
    instance_handles: Vec<BackendHandle>,
    seeks: Vec<SeekCompletion>,
    announce_recreation: bool,
}

/// Shared view into every backend created by [`BackendProbe::factory`]
#[derive(Debug, Clone, Default)]
pub struct BackendProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl BackendProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory producing backends that report into this probe
    pub fn factory(&self) -> ScriptedFactory {
        ScriptedFactory {
            probe: self.clone(),
        }
    }

    /// Make every instance after the first report `Recreated` on creation
    pub fn announce_recreation(&self, announce: bool) {
        self.lock().announce_recreation = announce;
    }

    /// Commands received so far, across all instances
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.lock().commands.clone()
    }

    /// Commands received so far, clearing the log
    pub fn take_commands(&self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    pub fn last_command(&self) -> Option<BackendCommand> {
        self.lock().commands.last().cloned()
    }

    /// Every `Load` received, as (source, play_when_ready)
    pub fn loads(&self) -> Vec<(String, bool)> {
        self.lock()
            .commands
            .iter()
            .filter_map(|command| match command {
                BackendCommand::Load {
                    source_url,
                    play_when_ready,
                    ..
                } => Some((source_url.clone(), *play_when_ready)),
                _ => None,
            })
            .collect()
    }

    /// Handle passed to the most recent `load`
    pub fn handle(&self) -> Option<BackendHandle> {
        self.lock().load_handles.last().cloned()
    }

    /// Handles passed to every `load`, oldest first
    pub fn load_handles(&self) -> Vec<BackendHandle> {
        self.lock().load_handles.clone()
    }

    /// Handle passed to the most recent `create`
    pub fn instance_handle(&self) -> Option<BackendHandle> {
        self.lock().instance_handles.last().cloned()
    }

    pub fn instances_created(&self) -> usize {
        self.lock().instance_handles.len()
    }

    /// Report `event` about the most recently loaded item
    ///
    /// Returns `false` if nothing was loaded yet or the controller is gone.
    pub fn emit(&self, event: BackendEvent) -> bool {
        self.handle().is_some_and(|handle| handle.send(event))
    }

    /// Report `event` from the most recently created instance
    pub fn emit_instance(&self, event: BackendEvent) -> bool {
        self.instance_handle()
            .is_some_and(|handle| handle.send(event))
    }

    /// Seek completions not yet answered, oldest first
    pub fn take_seeks(&self) -> Vec<SeekCompletion> {
        std::mem::take(&mut self.lock().seeks)
    }

    fn record(&self, command: BackendCommand) {
        self.lock().commands.push(command);
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Factory for [`ScriptedBackend`]s
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    probe: BackendProbe,
}

impl BackendFactory for ScriptedFactory {
    fn create(&mut self, handle: BackendHandle) -> Box<dyn PlayerBackend> {
        let announce = {
            let mut state = self.probe.lock();
            state.instance_handles.push(handle.clone());
            state.announce_recreation && state.instance_handles.len() > 1
        };
        if announce {
            handle.recreated();
        }
        Box::new(ScriptedBackend {
            probe: self.probe.clone(),
        })
    }
}

/// Backend that records commands instead of playing audio
#[derive(Debug)]
pub struct ScriptedBackend {
    probe: BackendProbe,
}

impl PlayerBackend for ScriptedBackend {
    fn load(&mut self, item: &ItemRef, play_when_ready: bool, handle: BackendHandle) -> Result<()> {
        item.resolve_source()?;
        let mut state = self.probe.lock();
        state.commands.push(BackendCommand::Load {
            source_url: item.source_url.clone(),
            play_when_ready,
            generation: handle.generation(),
        });
        state.load_handles.push(handle);
        Ok(())
    }

    fn play(&mut self) {
        self.probe.record(BackendCommand::Play);
    }

    fn pause(&mut self) {
        self.probe.record(BackendCommand::Pause);
    }

    fn stop(&mut self) {
        self.probe.record(BackendCommand::Stop);
    }

    fn seek(&mut self, to: f64, completion: SeekCompletion) {
        let mut state = self.probe.lock();
        state.commands.push(BackendCommand::Seek {
            to,
            seek_id: completion.seek_id(),
        });
        state.seeks.push(completion);
    }

    fn set_rate(&mut self, rate: f32) {
        self.probe.record(BackendCommand::SetRate(rate));
    }

    fn set_volume(&mut self, volume: f32) {
        self.probe.record(BackendCommand::SetVolume(volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.probe.record(BackendCommand::SetMuted(muted));
    }
}
