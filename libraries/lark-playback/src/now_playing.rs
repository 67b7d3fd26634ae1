//! Now-playing publisher
//!
//! Turns the controller's state and position into a key/value snapshot and
//! writes it to an external [`MetadataSink`]. Artwork is resolved lazily by an
//! [`ArtworkResolver`] whose answers come back over a channel, so a slow
//! resolver never holds up a playback transition.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

use crate::item::{same_item, Artwork, ItemRef, SourceKind};
use crate::types::{PlaybackState, PositionSnapshot};

/// Keys written to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NowPlayingKey {
    Title,
    Artist,
    AlbumTitle,
    MediaType,
    IsLiveStream,
    ElapsedPlaybackTime,
    PlaybackDuration,
    PlaybackRate,
    DefaultPlaybackRate,
    Artwork,
}

impl NowPlayingKey {
    pub fn as_str(self) -> &'static str {
        match self {
            NowPlayingKey::Title => "title",
            NowPlayingKey::Artist => "artist",
            NowPlayingKey::AlbumTitle => "albumTitle",
            NowPlayingKey::MediaType => "mediaType",
            NowPlayingKey::IsLiveStream => "isLiveStream",
            NowPlayingKey::ElapsedPlaybackTime => "elapsedPlaybackTime",
            NowPlayingKey::PlaybackDuration => "playbackDuration",
            NowPlayingKey::PlaybackRate => "playbackRate",
            NowPlayingKey::DefaultPlaybackRate => "defaultPlaybackRate",
            NowPlayingKey::Artwork => "artwork",
        }
    }
}

/// Value stored under a now-playing key
#[derive(Debug, Clone, PartialEq)]
pub enum NowPlayingValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Artwork(Artwork),
}

/// Snapshot handed to the sink
pub type NowPlayingInfo = BTreeMap<String, NowPlayingValue>;

/// External key/value surface (OS media center, remote, UI)
///
/// Implementations may ignore keys they do not know.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataSink: Send {
    /// Remove all now-playing information
    fn clear(&mut self);

    /// Replace the published information with `info`
    fn apply(&mut self, info: &NowPlayingInfo);
}

/// Resolves artwork for an item, possibly asynchronously
pub trait ArtworkResolver: Send {
    /// Start resolving; call `completion` from any thread when done
    fn resolve(&mut self, item: &ItemRef, completion: ArtworkCompletion);
}

/// One-shot answer channel for an artwork request
#[derive(Debug)]
pub struct ArtworkCompletion {
    tx: Sender<ResolvedArtwork>,
    item: ItemRef,
}

impl ArtworkCompletion {
    /// Item the request was made for
    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    /// Deliver the result; `false` if the publisher is gone
    pub fn complete(self, artwork: Option<Artwork>) -> bool {
        self.tx
            .send(ResolvedArtwork {
                item: self.item,
                artwork,
            })
            .is_ok()
    }
}

#[derive(Debug)]
struct ResolvedArtwork {
    item: ItemRef,
    artwork: Option<Artwork>,
}

/// Resolves the artwork already attached to the item
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineArtworkResolver;

impl ArtworkResolver for InlineArtworkResolver {
    fn resolve(&mut self, item: &ItemRef, completion: ArtworkCompletion) {
        completion.complete(item.artwork.clone());
    }
}

/// Sink keeping the last snapshot in memory
///
/// Clones share the same storage, so a host can keep one clone for reading
/// while the publisher owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    info: NowPlayingInfo,
    applies: usize,
    clears: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied snapshot (empty after `clear`)
    pub fn info(&self) -> NowPlayingInfo {
        self.lock().info.clone()
    }

    pub fn get(&self, key: NowPlayingKey) -> Option<NowPlayingValue> {
        self.lock().info.get(key.as_str()).cloned()
    }

    pub fn apply_count(&self) -> usize {
        self.lock().applies
    }

    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataSink for MemorySink {
    fn clear(&mut self) {
        let mut state = self.lock();
        state.info.clear();
        state.clears += 1;
    }

    fn apply(&mut self, info: &NowPlayingInfo) {
        let mut state = self.lock();
        state.info.clone_from(info);
        state.applies += 1;
    }
}

/// Builds now-playing snapshots and writes them to a sink
///
/// The sink is only touched when the snapshot actually changed.
pub struct NowPlayingPublisher {
    sink: Box<dyn MetadataSink>,
    resolver: Option<Box<dyn ArtworkResolver>>,
    artwork_tx: Sender<ResolvedArtwork>,
    artwork_rx: Receiver<ResolvedArtwork>,

    /// Item the published snapshot describes
    active: Option<ItemRef>,
    artwork: Option<Artwork>,

    /// `None` once cleared
    published: Option<NowPlayingInfo>,
}

impl NowPlayingPublisher {
    pub fn new(sink: impl MetadataSink + 'static) -> Self {
        let (artwork_tx, artwork_rx) = unbounded();
        Self {
            sink: Box::new(sink),
            resolver: None,
            artwork_tx,
            artwork_rx,
            active: None,
            artwork: None,
            published: None,
        }
    }

    /// Resolve artwork through `resolver` whenever a new item becomes active
    #[must_use]
    pub fn with_artwork_resolver(mut self, resolver: impl ArtworkResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Last snapshot written to the sink
    pub fn info(&self) -> Option<&NowPlayingInfo> {
        self.published.as_ref()
    }

    /// Publish the snapshot for `state` and `position`
    ///
    /// Clears the sink when `position` has no item.
    pub fn publish(&mut self, state: PlaybackState, position: &PositionSnapshot, rate: f32) {
        let Some(item) = position.item.as_ref() else {
            self.clear();
            return;
        };

        if !self.active.as_ref().is_some_and(|active| same_item(active, item)) {
            self.activate(item);
        }

        let info = self.build(item, state, position, rate);
        self.write(info);
    }

    /// Remove everything from the sink
    pub fn clear(&mut self) {
        self.active = None;
        self.artwork = None;
        if self.published.take().is_some() {
            debug!("clearing now-playing info");
            self.sink.clear();
        }
    }

    /// Apply artwork that finished resolving
    ///
    /// Answers for items that are no longer active are dropped. Returns
    /// whether the sink was updated.
    pub fn poll_artwork(&mut self) -> bool {
        let mut updated = false;
        while let Ok(resolved) = self.artwork_rx.try_recv() {
            let is_active = self
                .active
                .as_ref()
                .is_some_and(|active| same_item(active, &resolved.item));
            if !is_active {
                trace!(source = %resolved.item.source_url, "dropping artwork for inactive item");
                continue;
            }

            self.artwork = resolved.artwork;
            if let Some(mut info) = self.published.clone() {
                set_artwork(&mut info, self.artwork.as_ref());
                updated |= self.write(info);
            }
        }
        updated
    }

    fn activate(&mut self, item: &ItemRef) {
        self.active = Some(item.clone());
        self.artwork = None;

        if let Some(resolver) = self.resolver.as_mut() {
            debug!(source = %item.source_url, "requesting artwork");
            resolver.resolve(
                item,
                ArtworkCompletion {
                    tx: self.artwork_tx.clone(),
                    item: item.clone(),
                },
            );
        }
    }

    fn build(
        &self,
        item: &ItemRef,
        state: PlaybackState,
        position: &PositionSnapshot,
        rate: f32,
    ) -> NowPlayingInfo {
        let mut info = NowPlayingInfo::new();
        let mut put = |key: NowPlayingKey, value: NowPlayingValue| {
            info.insert(key.as_str().to_string(), value);
        };

        put(
            NowPlayingKey::Title,
            NowPlayingValue::Text(item.display_title().to_string()),
        );
        if let Some(artist) = &item.artist {
            put(NowPlayingKey::Artist, NowPlayingValue::Text(artist.clone()));
        }
        if let Some(album) = &item.album_title {
            put(NowPlayingKey::AlbumTitle, NowPlayingValue::Text(album.clone()));
        }
        put(
            NowPlayingKey::MediaType,
            NowPlayingValue::Text("audio".to_string()),
        );
        put(
            NowPlayingKey::IsLiveStream,
            NowPlayingValue::Bool(item.source_kind == SourceKind::Stream && position.duration.is_none()),
        );
        put(
            NowPlayingKey::ElapsedPlaybackTime,
            NowPlayingValue::Number(position.elapsed),
        );
        if let Some(duration) = position.duration {
            put(
                NowPlayingKey::PlaybackDuration,
                NowPlayingValue::Number(duration),
            );
        }
        let effective_rate = if state == PlaybackState::Playing { rate } else { 0.0 };
        put(
            NowPlayingKey::PlaybackRate,
            NowPlayingValue::Number(f64::from(effective_rate)),
        );
        put(
            NowPlayingKey::DefaultPlaybackRate,
            NowPlayingValue::Number(1.0),
        );

        set_artwork(&mut info, self.artwork.as_ref());
        info
    }

    fn write(&mut self, info: NowPlayingInfo) -> bool {
        if self.published.as_ref() == Some(&info) {
            return false;
        }
        self.sink.apply(&info);
        self.published = Some(info);
        true
    }
}

impl std::fmt::Debug for NowPlayingPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NowPlayingPublisher")
            .field("active", &self.active.as_ref().map(|item| &item.source_url))
            .field("has_resolver", &self.resolver.is_some())
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

fn set_artwork(info: &mut NowPlayingInfo, artwork: Option<&Artwork>) {
    let key = NowPlayingKey::Artwork.as_str();
    match artwork {
        Some(artwork) => {
            info.insert(key.to_string(), NowPlayingValue::Artwork(artwork.clone()));
        }
        None => {
            info.remove(key);
        }
    }
}
