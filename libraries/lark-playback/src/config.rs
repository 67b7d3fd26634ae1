//! Playback configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{PlaybackError, Result};
use crate::types::{RepeatMode, ShuffleMode};

/// Environment variable prefix, e.g. `LARK_PLAYBACK_REPEAT=queue`
pub const ENV_PREFIX: &str = "LARK_PLAYBACK";

/// Configuration for the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle mode (default: Off)
    pub shuffle: ShuffleMode,

    /// Initial playback rate (default: 1.0)
    pub rate: f32,

    /// Initial volume, 0.0-1.0 (default: 1.0)
    pub volume: f32,

    /// Minimum change in elapsed seconds between position events (default: 1.0)
    ///
    /// Only throttles [`PlayerEvent::PositionUpdated`](crate::PlayerEvent);
    /// the now-playing sink sees every update.
    pub position_event_interval: f64,

    /// Replace the backend after a fatal error (default: true)
    ///
    /// When false a fatal error leaves the player idle until the host calls
    /// [`PlaybackController::recreate_backend`](crate::PlaybackController::recreate_backend).
    pub recreate_on_fatal_error: bool,

    /// Load the next item when one ends (default: true)
    pub auto_advance: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            repeat: RepeatMode::Off,
            shuffle: ShuffleMode::Off,
            rate: 1.0,
            volume: 1.0,
            position_event_interval: 1.0,
            recreate_on_fatal_error: true,
            auto_advance: true,
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables (`LARK_PLAYBACK_*`) override file values, file
    /// values override defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            } else {
                warn!(path = %path.display(), "config file not found, using defaults");
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: PlaybackConfig = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot use
    pub fn validate(&self) -> Result<()> {
        if !valid_rate(self.rate) {
            return Err(PlaybackError::Config(format!(
                "rate must be positive, got {}",
                self.rate
            )));
        }
        if !valid_volume(self.volume) {
            return Err(PlaybackError::Config(format!(
                "volume must be within 0.0-1.0, got {}",
                self.volume
            )));
        }
        if !valid_interval(self.position_event_interval) {
            return Err(PlaybackError::Config(format!(
                "position_event_interval must be non-negative, got {}",
                self.position_event_interval
            )));
        }
        Ok(())
    }

    /// Replace values rejected by [`validate`](Self::validate) with defaults
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if let Err(err) = self.validate() {
            warn!(%err, "invalid playback config, using defaults for rejected values");
        }

        let defaults = Self::default();
        if !valid_rate(self.rate) {
            self.rate = defaults.rate;
        }
        if !valid_volume(self.volume) {
            self.volume = if self.volume.is_finite() {
                self.volume.clamp(0.0, 1.0)
            } else {
                defaults.volume
            };
        }
        if !valid_interval(self.position_event_interval) {
            self.position_event_interval = defaults.position_event_interval;
        }
        self
    }
}

fn valid_rate(rate: f32) -> bool {
    rate.is_finite() && rate > 0.0
}

fn valid_volume(volume: f32) -> bool {
    (0.0..=1.0).contains(&volume)
}

fn valid_interval(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}
