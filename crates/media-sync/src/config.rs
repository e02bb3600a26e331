//! Configuration loading and parsing.
//!
//! Defines the TOML schema for a sync context and resolves it into the
//! runtime [`SyncConfig`] with protocol defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Sync key used when the host does not supply one.
pub const DEFAULT_SYNC_KEY: &str = "vj-player-default";
/// Media id published before the host selects one.
pub const DEFAULT_VIDEO_ID: &str = "42jhMWfKY9Y";

/// Absorbs float noise so a delta of exactly the threshold never counts as exceeding it.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Which side of the channel this context plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns playback and publishes state.
    #[default]
    Controller,
    /// Follows the published state.
    Projection,
}

/// Jitter thresholds. A delta must be strictly greater than the threshold to count.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    /// Playback position drift in seconds.
    pub time_secs: f64,
    /// Volume percent.
    pub volume: u8,
    /// Playback rate.
    pub playback_rate: f64,
    /// Duration change treated as a new media item, in seconds.
    pub duration_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            time_secs: 1.0,
            volume: 1,
            playback_rate: 0.01,
            duration_secs: 1.0,
        }
    }
}

impl Thresholds {
    pub fn time_exceeded(&self, a: f64, b: f64) -> bool {
        exceeds((a - b).abs(), self.time_secs)
    }

    pub fn volume_exceeded(&self, a: u8, b: u8) -> bool {
        a.abs_diff(b) > self.volume
    }

    pub fn rate_exceeded(&self, a: f64, b: f64) -> bool {
        exceeds((a - b).abs(), self.playback_rate)
    }

    pub fn duration_exceeded(&self, a: f64, b: f64) -> bool {
        exceeds((a - b).abs(), self.duration_secs)
    }
}

fn exceeds(delta: f64, threshold: f64) -> bool {
    delta - threshold > THRESHOLD_EPSILON
}

/// Resolved runtime configuration for one sync context.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Key shared by the controller and its projections.
    pub sync_key: String,
    /// Role of this context.
    pub role: Role,
    /// Restart playback locally when media ends.
    pub auto_loop: bool,
    /// Subscriber poll period.
    pub poll_interval: Duration,
    /// Minimum spacing between published seeks.
    pub seek_debounce: Duration,
    /// Media id published until the host sets one.
    pub default_video_id: String,
    /// Directory holding file-backed channel slots.
    pub channel_dir: Option<PathBuf>,
    /// Jitter thresholds for publishing and reconciling.
    pub thresholds: Thresholds,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_key: DEFAULT_SYNC_KEY.to_string(),
            role: Role::Controller,
            auto_loop: true,
            poll_interval: Duration::from_millis(100),
            seek_debounce: Duration::from_millis(100),
            default_video_id: DEFAULT_VIDEO_ID.to_string(),
            channel_dir: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl SyncConfig {
    /// Load and resolve a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        SyncFileConfig::load(path)?.resolve()
    }

    /// Channel slot key for this context.
    pub fn channel_key(&self) -> String {
        channel_key(&self.sync_key)
    }

    /// Directory for file-backed slots, falling back to the system temp dir.
    pub fn channel_dir(&self) -> PathBuf {
        self.channel_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("media-sync"))
    }
}

/// Build the slot key for a sync key.
pub fn channel_key(sync_key: &str) -> String {
    format!("sync-{sync_key}")
}

/// Sync config as written in TOML. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SyncFileConfig {
    /// Key shared between windows.
    pub sync_key: Option<String>,
    /// `controller` or `projection`.
    pub role: Option<Role>,
    /// Loop on end of media (default: true).
    pub auto_loop: Option<bool>,
    /// Poll period in milliseconds (default: 100).
    pub poll_interval_ms: Option<u64>,
    /// Seek publish debounce in milliseconds (default: 100).
    pub seek_debounce_ms: Option<u64>,
    /// Initial media id.
    pub default_video_id: Option<String>,
    /// Directory for file-backed slots.
    pub channel_dir: Option<String>,
    /// Threshold overrides.
    pub thresholds: Option<ThresholdsConfig>,
}

/// Threshold overrides from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ThresholdsConfig {
    pub time_secs: Option<f64>,
    pub volume: Option<u8>,
    pub playback_rate: Option<f64>,
    pub duration_secs: Option<f64>,
}

impl SyncFileConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<SyncFileConfig>(raw)?)
    }

    /// Apply defaults and validate.
    pub fn resolve(self) -> Result<SyncConfig> {
        let defaults = SyncConfig::default();
        let sync_key = match self.sync_key.as_deref().map(str::trim) {
            Some("") => return Err(anyhow::anyhow!("sync_key must not be empty")),
            Some(key) => key.to_string(),
            None => defaults.sync_key,
        };
        let poll_interval = match self.poll_interval_ms {
            Some(0) => return Err(anyhow::anyhow!("poll_interval_ms must be positive")),
            Some(ms) => Duration::from_millis(ms),
            None => defaults.poll_interval,
        };
        let seek_debounce = self
            .seek_debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.seek_debounce);
        let channel_dir = self.channel_dir.as_deref().and_then(|dir| {
            let trimmed = dir.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            }
        });

        let mut thresholds = defaults.thresholds;
        if let Some(t) = self.thresholds {
            thresholds.time_secs = t.time_secs.unwrap_or(thresholds.time_secs);
            thresholds.volume = t.volume.unwrap_or(thresholds.volume);
            thresholds.playback_rate = t.playback_rate.unwrap_or(thresholds.playback_rate);
            thresholds.duration_secs = t.duration_secs.unwrap_or(thresholds.duration_secs);
        }
        for (name, value) in [
            ("time_secs", thresholds.time_secs),
            ("playback_rate", thresholds.playback_rate),
            ("duration_secs", thresholds.duration_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow::anyhow!("threshold {name} must be a non-negative number"));
            }
        }

        Ok(SyncConfig {
            sync_key,
            role: self.role.unwrap_or(defaults.role),
            auto_loop: self.auto_loop.unwrap_or(defaults.auto_loop),
            poll_interval,
            seek_debounce,
            default_video_id: self.default_video_id.unwrap_or(defaults.default_video_id),
            channel_dir,
            thresholds,
        })
    }
}
