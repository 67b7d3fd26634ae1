//! Shared helpers for integration tests

#![allow(dead_code)]

use lark_playback::testing::BackendProbe;
use lark_playback::{
    AudioItem, BackendEvent, BackendState, ItemRef, MemorySink, NowPlayingPublisher,
    PlaybackConfig, PlaybackController, SourceKind,
};

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_test_item(name: &str) -> ItemRef {
    AudioItem::new(format!("/music/{}.mp3", name), SourceKind::File)
        .with_title(name)
        .with_artist("Test Artist")
        .into_ref()
}

pub fn create_test_items(names: &[&str]) -> Vec<ItemRef> {
    names.iter().map(|name| create_test_item(name)).collect()
}

/// Controller wired to a scripted backend and an in-memory sink
pub struct Harness {
    pub controller: PlaybackController,
    pub probe: BackendProbe,
    pub sink: MemorySink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        init_tracing();
        let probe = BackendProbe::new();
        let sink = MemorySink::new();
        let controller = PlaybackController::new(
            probe.factory(),
            NowPlayingPublisher::new(sink.clone()),
            config,
        );
        Self {
            controller,
            probe,
            sink,
        }
    }

    /// Queue `names` and start playing the first one
    pub fn playing(names: &[&str]) -> Self {
        let mut harness = Self::new();
        harness.controller.add(create_test_items(names));
        harness.controller.play().unwrap();
        harness.report(BackendState::Ready);
        harness.report(BackendState::Playing);
        harness
    }

    /// Deliver a state report about the loaded item
    pub fn report(&mut self, state: BackendState) {
        self.emit(BackendEvent::StateChanged(state));
    }

    /// Deliver `event` about the loaded item and apply it
    pub fn emit(&mut self, event: BackendEvent) {
        assert!(self.probe.emit(event), "nothing loaded");
        self.controller.process_backend_events();
    }
}
