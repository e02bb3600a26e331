//! Local restart on end of media.
//!
//! Runs in every context, controller and projection alike, and only ever
//! touches the local player. The restart is not published. Because each
//! context loops on its own ENDED, a projection can run up to one cycle
//! ahead of or behind its controller until the next published change.

use crate::player::Player;
use media_sync_types::{PlayerState, PlayerStatus};

#[derive(Clone, Debug)]
pub struct LoopController {
    enabled: bool,
}

impl Default for LoopController {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl LoopController {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Restart `player` from zero if `status` reports ENDED.
    ///
    /// Returns `true` when the restart was issued. A failed seek skips the play.
    pub fn on_status(&self, player: &dyn Player, status: &PlayerStatus) -> bool {
        if !self.enabled || status.player_state != PlayerState::Ended {
            return false;
        }
        match player.seek_to(0.0, true).and_then(|()| player.play()) {
            Ok(()) => {
                tracing::debug!(duration = status.duration, "media ended; looping");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "loop restart failed");
                false
            }
        }
    }
}
