//! Per-axis reconciliation of a local player against a target record.

use crate::config::Thresholds;
use crate::player::{Player, PlayerCommand};
use media_sync_types::{PlayerState, PlayerStatus, SyncRecord};

/// Commands issued by one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileReport {
    /// Commands the player accepted.
    pub issued: Vec<PlayerCommand>,
    /// Commands the player rejected.
    pub failed: Vec<PlayerCommand>,
}

impl ReconcileReport {
    /// True when the player already matched the target.
    pub fn is_noop(&self) -> bool {
        self.issued.is_empty() && self.failed.is_empty()
    }
}

/// Computes and applies the minimal command set that brings a local player
/// within threshold of a target state.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    thresholds: Thresholds,
}

impl Reconciler {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Commands needed to move `local` to `target`, in application order.
    ///
    /// Only `Playing` and `Paused` targets drive play state. Volume is left
    /// alone while the target is muted.
    pub fn plan(&self, local: &PlayerStatus, target: &PlayerStatus) -> Vec<PlayerCommand> {
        let t = &self.thresholds;
        let mut commands = Vec::new();

        if t.time_exceeded(local.current_time, target.current_time) {
            commands.push(PlayerCommand::SeekTo {
                seconds: target.current_time,
                allow_seek_ahead: true,
            });
        }

        if local.player_state != target.player_state {
            match target.player_state {
                PlayerState::Playing => commands.push(PlayerCommand::Play),
                PlayerState::Paused => commands.push(PlayerCommand::Pause),
                _ => {}
            }
        }

        if target.is_muted != local.is_muted {
            commands.push(if target.is_muted {
                PlayerCommand::Mute
            } else {
                PlayerCommand::Unmute
            });
        }

        if !target.is_muted && t.volume_exceeded(local.volume, target.volume) {
            commands.push(PlayerCommand::SetVolume {
                value: target.volume,
            });
        }

        if t.rate_exceeded(local.playback_rate, target.playback_rate) {
            commands.push(PlayerCommand::SetPlaybackRate {
                rate: target.playback_rate,
            });
        }

        commands
    }

    /// Bring `player` in line with `record`.
    ///
    /// A rejected command is logged and does not stop the remaining axes.
    pub fn reconcile(&self, player: &dyn Player, record: &SyncRecord) -> ReconcileReport {
        let local = player.status();
        let target = record.status();
        let mut report = ReconcileReport::default();

        for cmd in self.plan(&local, &target) {
            match cmd.apply(player) {
                Ok(()) => {
                    tracing::debug!(command = cmd.name(), last_updated = record.last_updated, "sync command applied");
                    report.issued.push(cmd);
                }
                Err(e) => {
                    tracing::warn!(command = cmd.name(), error = %e, "sync command failed");
                    report.failed.push(cmd);
                }
            }
        }
        report
    }
}
