use serde::{Deserialize, Serialize};

/// Schema version written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

/// Player lifecycle state.
///
/// Numeric codes match the embedded player's wire values and are what gets
/// serialized into a [`SyncRecord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PlayerState {
    /// Player created but nothing loaded or started yet.
    #[default]
    Unstarted,
    /// Reached end of media.
    Ended,
    /// Actively playing.
    Playing,
    /// Paused by the user or a command.
    Paused,
    /// Waiting on data.
    Buffering,
    /// Media cued but not started.
    Cued,
}

impl PlayerState {
    /// Wire code for this state.
    pub fn code(self) -> i32 {
        match self {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::Cued => 5,
        }
    }

    /// Parse a wire code, returning `None` for unknown values.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PlayerState::Unstarted),
            0 => Some(PlayerState::Ended),
            1 => Some(PlayerState::Playing),
            2 => Some(PlayerState::Paused),
            3 => Some(PlayerState::Buffering),
            5 => Some(PlayerState::Cued),
            _ => None,
        }
    }
}

impl TryFrom<i32> for PlayerState {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        PlayerState::from_code(code).ok_or_else(|| format!("unknown player state code {code}"))
    }
}

impl From<PlayerState> for i32 {
    fn from(state: PlayerState) -> Self {
        state.code()
    }
}

/// Point-in-time status read from a local player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    /// Lifecycle state.
    pub player_state: PlayerState,
    /// Playback speed multiplier (1.0 = normal).
    pub playback_rate: f64,
    /// Volume percent, 0-100.
    pub volume: u8,
    /// `true` when audio is muted.
    pub is_muted: bool,
    /// Playback position in seconds.
    pub current_time: f64,
    /// Media length in seconds (0 when unknown).
    pub duration: f64,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            player_state: PlayerState::Unstarted,
            playback_rate: 1.0,
            volume: 100,
            is_muted: false,
            current_time: 0.0,
            duration: 0.0,
        }
    }
}

/// Snapshot published by the controller and read by projections.
///
/// Only one record lives under a channel key at a time; each publish
/// supersedes the previous one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Payload schema version. Records without the field are read as version 1.
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    /// Active media item id.
    pub video_id: String,
    /// Controller lifecycle state.
    pub player_state: PlayerState,
    /// Controller playback speed.
    pub playback_rate: f64,
    /// Controller volume percent.
    pub volume: u8,
    /// Controller mute flag.
    pub is_muted: bool,
    /// Controller position in seconds at publish time.
    pub current_time: f64,
    /// Media length in seconds.
    pub duration: f64,
    /// Publish time in unix milliseconds; orders records for subscribers.
    pub last_updated: u64,
}

fn legacy_schema_version() -> u32 {
    1
}

/// Reasons a channel payload is rejected.
#[derive(Debug, thiserror::Error)]
pub enum MalformedRecord {
    #[error("invalid sync payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

impl SyncRecord {
    /// Build a record from a status snapshot.
    pub fn from_status(video_id: impl Into<String>, status: &PlayerStatus, last_updated: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            video_id: video_id.into(),
            player_state: status.player_state,
            playback_rate: status.playback_rate,
            volume: status.volume,
            is_muted: status.is_muted,
            current_time: status.current_time,
            duration: status.duration,
            last_updated,
        }
    }

    /// Status fields carried by this record.
    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            player_state: self.player_state,
            playback_rate: self.playback_rate,
            volume: self.volume,
            is_muted: self.is_muted,
            current_time: self.current_time,
            duration: self.duration,
        }
    }

    /// Serialize to the JSON wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate a JSON payload.
    pub fn decode(raw: &str) -> Result<Self, MalformedRecord> {
        let record: SyncRecord = serde_json::from_str(raw)?;
        record.validate()?;
        Ok(record)
    }

    /// Check field ranges that the JSON types alone cannot express.
    pub fn validate(&self) -> Result<(), MalformedRecord> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(MalformedRecord::UnsupportedVersion(self.schema_version));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(MalformedRecord::OutOfRange {
                field: "playbackRate",
                value: self.playback_rate,
            });
        }
        if self.volume > 100 {
            return Err(MalformedRecord::OutOfRange {
                field: "volume",
                value: self.volume as f64,
            });
        }
        for (field, value) in [
            ("currentTime", self.current_time),
            ("duration", self.duration),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MalformedRecord::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}
