use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::channel::{ChangeListener, SlotStore};
use crate::error::{ChannelError, PlayerError};
use crate::player::{Player, PlayerCommand};
use media_sync_types::{PlayerState, PlayerStatus, SyncRecord};

/// Slot store that records every write.
#[derive(Default)]
pub(crate) struct RecordingStore {
    slots: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub(crate) fn written_records(&self) -> Vec<SyncRecord> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, raw)| SyncRecord::decode(raw).unwrap())
            .collect()
    }

    fn check(&self) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(ChannelError::Unavailable("quota exceeded".to_string()));
        }
        Ok(())
    }
}

impl SlotStore for RecordingStore {
    fn write(&self, key: &str, payload: &str) -> Result<(), ChannelError> {
        self.check()?;
        self.slots
            .lock()
            .unwrap()
            .insert(key.to_string(), payload.to_string());
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_string()));
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, ChannelError> {
        self.check()?;
        Ok(self.slots.lock().unwrap().get(key).cloned())
    }

    fn watch(&self, _key: &str) -> Result<ChangeListener, ChannelError> {
        self.check()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(ChangeListener::new(rx, move || drop(tx)))
    }
}

/// Player that records commands and applies them to its own status.
pub(crate) struct RecordingPlayer {
    status: Mutex<PlayerStatus>,
    commands: Mutex<Vec<PlayerCommand>>,
    rejecting: Mutex<Vec<&'static str>>,
}

impl RecordingPlayer {
    pub(crate) fn new(status: PlayerStatus) -> Self {
        Self {
            status: Mutex::new(status),
            commands: Mutex::new(Vec::new()),
            rejecting: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reject(&self, command: &'static str) {
        self.rejecting.lock().unwrap().push(command);
    }

    pub(crate) fn commands(&self) -> Vec<PlayerCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    fn run(&self, cmd: PlayerCommand) -> Result<(), PlayerError> {
        let name = cmd.name();
        if self.rejecting.lock().unwrap().contains(&name) {
            return Err(PlayerError::Rejected {
                command: name,
                reason: "test rejection".to_string(),
            });
        }
        {
            let mut s = self.status.lock().unwrap();
            match &cmd {
                PlayerCommand::Play => s.player_state = PlayerState::Playing,
                PlayerCommand::Pause => s.player_state = PlayerState::Paused,
                PlayerCommand::SeekTo { seconds, .. } => s.current_time = *seconds,
                PlayerCommand::Mute => s.is_muted = true,
                PlayerCommand::Unmute => s.is_muted = false,
                PlayerCommand::SetVolume { value } => s.volume = *value,
                PlayerCommand::SetPlaybackRate { rate } => s.playback_rate = *rate,
            }
        }
        self.commands.lock().unwrap().push(cmd);
        Ok(())
    }
}

impl Player for RecordingPlayer {
    fn status(&self) -> PlayerStatus {
        self.status.lock().unwrap().clone()
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.run(PlayerCommand::Play)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.run(PlayerCommand::Pause)
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError> {
        self.run(PlayerCommand::SeekTo {
            seconds,
            allow_seek_ahead,
        })
    }

    fn mute(&self) -> Result<(), PlayerError> {
        self.run(PlayerCommand::Mute)
    }

    fn unmute(&self) -> Result<(), PlayerError> {
        self.run(PlayerCommand::Unmute)
    }

    fn set_volume(&self, value: u8) -> Result<(), PlayerError> {
        self.run(PlayerCommand::SetVolume { value })
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.run(PlayerCommand::SetPlaybackRate { rate })
    }
}

/// Paused status used as a neutral baseline.
pub(crate) fn paused_status() -> PlayerStatus {
    PlayerStatus {
        player_state: PlayerState::Paused,
        playback_rate: 1.0,
        volume: 50,
        is_muted: false,
        current_time: 0.0,
        duration: 120.0,
    }
}

/// Playing record at 10s, volume 80, stamped `last_updated`.
pub(crate) fn record_at(last_updated: u64) -> SyncRecord {
    SyncRecord::from_status(
        "42jhMWfKY9Y",
        &PlayerStatus {
            player_state: PlayerState::Playing,
            playback_rate: 1.0,
            volume: 80,
            is_muted: false,
            current_time: 10.0,
            duration: 120.0,
        },
        last_updated,
    )
}
