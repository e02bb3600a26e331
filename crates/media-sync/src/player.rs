//! Local player capability and command-channel adapter.
//!
//! The sync core never embeds a player; it drives whatever implements
//! [`Player`]. [`ChannelPlayer`] forwards commands to a player that lives on
//! its own worker thread.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::error::PlayerError;
use media_sync_types::PlayerStatus;

/// Commands accepted by a local player.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    /// Jump to an absolute position in seconds.
    SeekTo {
        seconds: f64,
        allow_seek_ahead: bool,
    },
    Mute,
    Unmute,
    /// Set volume percent (0-100).
    SetVolume { value: u8 },
    SetPlaybackRate { rate: f64 },
}

impl PlayerCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::SeekTo { .. } => "seek_to",
            PlayerCommand::Mute => "mute",
            PlayerCommand::Unmute => "unmute",
            PlayerCommand::SetVolume { .. } => "set_volume",
            PlayerCommand::SetPlaybackRate { .. } => "set_playback_rate",
        }
    }

    /// Invoke the matching method on `player`.
    pub fn apply(&self, player: &dyn Player) -> Result<(), PlayerError> {
        match *self {
            PlayerCommand::Play => player.play(),
            PlayerCommand::Pause => player.pause(),
            PlayerCommand::SeekTo {
                seconds,
                allow_seek_ahead,
            } => player.seek_to(seconds, allow_seek_ahead),
            PlayerCommand::Mute => player.mute(),
            PlayerCommand::Unmute => player.unmute(),
            PlayerCommand::SetVolume { value } => player.set_volume(value),
            PlayerCommand::SetPlaybackRate { rate } => player.set_playback_rate(rate),
        }
    }
}

/// Local player capability consumed by the sync core.
pub trait Player: Send + Sync {
    /// Current status snapshot.
    fn status(&self) -> PlayerStatus;
    fn play(&self) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError>;
    fn mute(&self) -> Result<(), PlayerError>;
    fn unmute(&self) -> Result<(), PlayerError>;
    fn set_volume(&self, value: u8) -> Result<(), PlayerError>;
    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError>;
}

/// Status cell shared between a player worker and its handle.
pub type SharedStatus = Arc<Mutex<PlayerStatus>>;

/// [`Player`] backed by a command queue.
///
/// Status is read from a shared cell the worker keeps current; commands are
/// queued and never block the caller.
#[derive(Clone)]
pub struct ChannelPlayer {
    cmd_tx: Sender<PlayerCommand>,
    status: SharedStatus,
}

impl ChannelPlayer {
    pub fn new(cmd_tx: Sender<PlayerCommand>, status: SharedStatus) -> Self {
        Self { cmd_tx, status }
    }

    /// Spawn a worker thread that feeds queued commands to `execute`.
    ///
    /// The worker exits once every handle is dropped.
    pub fn spawn<F>(status: SharedStatus, execute: F) -> Self
    where
        F: FnMut(PlayerCommand, &SharedStatus) -> Result<(), PlayerError> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let worker_status = status.clone();
        std::thread::spawn(move || player_worker_main(cmd_rx, worker_status, execute));
        Self { cmd_tx, status }
    }

    fn send(&self, cmd: PlayerCommand) -> Result<(), PlayerError> {
        self.cmd_tx.send(cmd).map_err(|_| PlayerError::Offline)
    }
}

fn player_worker_main<F>(cmd_rx: Receiver<PlayerCommand>, status: SharedStatus, mut execute: F)
where
    F: FnMut(PlayerCommand, &SharedStatus) -> Result<(), PlayerError>,
{
    while let Ok(cmd) = cmd_rx.recv() {
        let name = cmd.name();
        if let Err(e) = execute(cmd, &status) {
            tracing::warn!(command = name, error = %e, "player worker command failed");
        }
    }
    tracing::debug!("player worker exiting");
}

impl Player for ChannelPlayer {
    fn status(&self) -> PlayerStatus {
        match self.status.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Pause)
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SeekTo {
            seconds,
            allow_seek_ahead,
        })
    }

    fn mute(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Mute)
    }

    fn unmute(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Unmute)
    }

    fn set_volume(&self, value: u8) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SetVolume {
            value: value.min(100),
        })
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SetPlaybackRate { rate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_sync_types::PlayerState;
    use std::time::Duration;

    #[test]
    fn command_names_are_stable() {
        assert_eq!(PlayerCommand::Play.name(), "play");
        assert_eq!(
            PlayerCommand::SeekTo {
                seconds: 1.0,
                allow_seek_ahead: true
            }
            .name(),
            "seek_to"
        );
        assert_eq!(
            PlayerCommand::SetPlaybackRate { rate: 1.5 }.name(),
            "set_playback_rate"
        );
    }

    #[test]
    fn channel_player_queues_commands_in_order() {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let player = ChannelPlayer::new(cmd_tx, Arc::new(Mutex::new(PlayerStatus::default())));

        player.seek_to(12.5, true).unwrap();
        player.play().unwrap();
        player.set_volume(140).unwrap();

        let cmds: Vec<_> = cmd_rx.try_iter().collect();
        assert_eq!(
            cmds,
            vec![
                PlayerCommand::SeekTo {
                    seconds: 12.5,
                    allow_seek_ahead: true
                },
                PlayerCommand::Play,
                PlayerCommand::SetVolume { value: 100 },
            ]
        );
    }

    #[test]
    fn channel_player_reports_offline_when_worker_gone() {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        drop(cmd_rx);
        let player = ChannelPlayer::new(cmd_tx, Arc::new(Mutex::new(PlayerStatus::default())));
        assert!(matches!(player.pause(), Err(PlayerError::Offline)));
    }

    #[test]
    fn spawned_worker_updates_shared_status() {
        let status: SharedStatus = Arc::new(Mutex::new(PlayerStatus::default()));
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let player = ChannelPlayer::spawn(status, move |cmd, status| {
            if let Ok(mut s) = status.lock() {
                if cmd == PlayerCommand::Play {
                    s.player_state = PlayerState::Playing;
                }
            }
            let _ = done_tx.send(());
            Ok(())
        });

        player.play().unwrap();
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker handled command");
        assert_eq!(player.status().player_state, PlayerState::Playing);
    }
}
