//! Playable items
//!
//! A single record with optional fields covers every item flavour. The
//! optional parts a backend may honour are reported as a [`Capability`] set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::error::{PlaybackError, Result};

/// Shared handle to an item
///
/// Items are compared by identity (`Arc::ptr_eq`), never by value: the same
/// locator may be queued twice and both entries stay distinct.
pub type ItemRef = Arc<AudioItem>;

/// Whether two handles refer to the same queued item
pub fn same_item(a: &ItemRef, b: &ItemRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Where the audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote resource addressed by URL
    Stream,

    /// Local file addressed by path (or `file://` URL)
    File,
}

/// Time-stretch algorithm used when playing at a rate other than 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePitchAlgorithm {
    /// Cheapest algorithm, audible artifacts at most rates
    LowQualityZeroLatency,

    /// Good for speech
    TimeDomain,

    /// Best for music, highest cost
    Spectral,

    /// Rate changes alter pitch
    Varispeed,
}

/// Artwork attached to an item
#[derive(Clone, PartialEq, Eq)]
pub enum Artwork {
    /// Already decoded or fetched image bytes
    Image {
        /// Encoded image data
        data: Arc<[u8]>,
        /// MIME type of `data`
        mime_type: String,
    },

    /// Image that still has to be fetched
    Url(String),
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artwork::Image { data, mime_type } => f
                .debug_struct("Image")
                .field("bytes", &data.len())
                .field("mime_type", mime_type)
                .finish(),
            Artwork::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// Optional behaviour an item asks the backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Item selects a time-stretch algorithm
    TimePitching,

    /// Item starts at an offset
    InitialTiming,

    /// Item carries backend initialization options
    BackendOptions,

    /// Item carries artwork
    Artwork,
}

/// Source locator after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Remote URL
    Url(Url),

    /// Local filesystem path
    Path(PathBuf),
}

/// One playable unit
#[derive(Debug, Clone)]
pub struct AudioItem {
    /// URI or file path
    pub source_url: String,

    /// How `source_url` is interpreted
    pub source_kind: SourceKind,

    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_title: Option<String>,

    /// Playback offset in seconds applied on load
    pub initial_time: Option<f64>,

    /// Time-stretch algorithm for non-unity rates
    pub pitch_algorithm: Option<TimePitchAlgorithm>,

    /// Opaque options handed to the backend when it opens the source
    pub backend_options: Option<BTreeMap<String, serde_json::Value>>,

    pub artwork: Option<Artwork>,
}

impl AudioItem {
    /// Create an item with only a source
    pub fn new(source_url: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            source_url: source_url.into(),
            source_kind,
            title: None,
            artist: None,
            album_title: None,
            initial_time: None,
            pitch_algorithm: None,
            backend_options: None,
            artwork: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album_title(mut self, album_title: impl Into<String>) -> Self {
        self.album_title = Some(album_title.into());
        self
    }

    pub fn with_initial_time(mut self, seconds: f64) -> Self {
        self.initial_time = Some(seconds);
        self
    }

    pub fn with_pitch_algorithm(mut self, algorithm: TimePitchAlgorithm) -> Self {
        self.pitch_algorithm = Some(algorithm);
        self
    }

    /// Add one backend initialization option
    pub fn with_backend_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.backend_options
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_artwork(mut self, artwork: Artwork) -> Self {
        self.artwork = Some(artwork);
        self
    }

    /// Wrap into a shared handle for queueing
    pub fn into_ref(self) -> ItemRef {
        Arc::new(self)
    }

    /// Optional behaviour this item carries
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        let mut caps = BTreeSet::new();
        if self.pitch_algorithm.is_some() {
            caps.insert(Capability::TimePitching);
        }
        if self.initial_time.is_some() {
            caps.insert(Capability::InitialTiming);
        }
        if self.backend_options.is_some() {
            caps.insert(Capability::BackendOptions);
        }
        if self.artwork.is_some() {
            caps.insert(Capability::Artwork);
        }
        caps
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Resolve the locator to something a backend can open
    ///
    /// Streams must be absolute URLs. Files may be plain paths or `file://` URLs.
    pub fn resolve_source(&self) -> Result<ResolvedSource> {
        let locator = self.source_url.trim();
        let invalid = || PlaybackError::InvalidSourceUrl(self.source_url.clone());

        if locator.is_empty() {
            return Err(invalid());
        }

        match self.source_kind {
            SourceKind::Stream => Url::parse(locator)
                .map(ResolvedSource::Url)
                .map_err(|_| invalid()),
            SourceKind::File if locator.starts_with("file:") => Url::parse(locator)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .map(ResolvedSource::Path)
                .ok_or_else(invalid),
            SourceKind::File => Ok(ResolvedSource::Path(PathBuf::from(locator))),
        }
    }

    /// Title, falling back to the last path segment of the locator
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| {
            self.source_url
                .rsplit(['/', '\\'])
                .find(|segment| !segment.is_empty())
                .unwrap_or(&self.source_url)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_item_has_no_capabilities() {
        let item = AudioItem::new("/music/a.mp3", SourceKind::File);
        assert!(item.capabilities().is_empty());
    }

    #[test]
    fn capabilities_follow_optional_fields() {
        let item = AudioItem::new("https://radio.example/live", SourceKind::Stream)
            .with_pitch_algorithm(TimePitchAlgorithm::Spectral)
            .with_initial_time(30.0)
            .with_backend_option("prefers_precise_timing", true);

        let caps = item.capabilities();
        assert!(caps.contains(&Capability::TimePitching));
        assert!(caps.contains(&Capability::InitialTiming));
        assert!(caps.contains(&Capability::BackendOptions));
        assert!(!item.has_capability(Capability::Artwork));
    }

    #[test]
    fn identity_not_value_equality() {
        let a = AudioItem::new("/music/a.mp3", SourceKind::File).into_ref();
        let b = AudioItem::new("/music/a.mp3", SourceKind::File).into_ref();
        assert!(same_item(&a, &a.clone()));
        assert!(!same_item(&a, &b));
    }

    #[test]
    fn resolve_stream_url() {
        let item = AudioItem::new("https://cdn.example/track.mp3", SourceKind::Stream);
        match item.resolve_source().unwrap() {
            ResolvedSource::Url(url) => assert_eq!(url.host_str(), Some("cdn.example")),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn resolve_rejects_relative_stream() {
        let item = AudioItem::new("not a url", SourceKind::Stream);
        assert_eq!(
            item.resolve_source(),
            Err(PlaybackError::InvalidSourceUrl("not a url".to_string()))
        );
    }

    #[test]
    fn resolve_file_paths() {
        let plain = AudioItem::new("/music/a.flac", SourceKind::File);
        assert_eq!(
            plain.resolve_source().unwrap(),
            ResolvedSource::Path(PathBuf::from("/music/a.flac"))
        );

        let empty = AudioItem::new("   ", SourceKind::File);
        assert!(matches!(
            empty.resolve_source(),
            Err(PlaybackError::InvalidSourceUrl(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_file_url() {
        let item = AudioItem::new("file:///music/b.ogg", SourceKind::File);
        assert_eq!(
            item.resolve_source().unwrap(),
            ResolvedSource::Path(PathBuf::from("/music/b.ogg"))
        );
    }

    #[test]
    fn display_title_falls_back_to_file_name() {
        let item = AudioItem::new("/music/album/03 - Song.flac", SourceKind::File);
        assert_eq!(item.display_title(), "03 - Song.flac");

        let titled = item.with_title("Song");
        assert_eq!(titled.display_title(), "Song");
    }

    #[test]
    fn artwork_debug_hides_bytes() {
        let artwork = Artwork::Image {
            data: Arc::from(vec![0u8; 16]),
            mime_type: "image/png".to_string(),
        };
        let rendered = format!("{:?}", artwork);
        assert!(rendered.contains("bytes: 16"));
    }
}
