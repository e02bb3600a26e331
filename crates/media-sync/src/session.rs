//! Per-context sync session.
//!
//! Wires the loop controller, publisher and subscriber around one local
//! player according to the context's [`Role`].

use std::sync::Arc;

use crate::channel::SharedChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::{Role, SyncConfig};
use crate::error::{ChannelError, PlayerError};
use crate::loop_control::LoopController;
use crate::player::Player;
use crate::publisher::SyncPublisher;
use crate::subscriber::{SubscriberHandle, SyncSubscriber};
use media_sync_types::PlayerStatus;

/// Callback invoked with every local status after sync handling.
pub type StatusObserver = Box<dyn Fn(&PlayerStatus) + Send + Sync>;

pub struct SyncSession {
    config: SyncConfig,
    channel: SharedChannel,
    player: Arc<dyn Player>,
    publisher: SyncPublisher,
    loop_controller: LoopController,
    observer: Option<StatusObserver>,
    last_status: Option<PlayerStatus>,
    force_next: bool,
}

impl SyncSession {
    pub fn new(
        config: &SyncConfig,
        channel: SharedChannel,
        player: Arc<dyn Player>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: config.clone(),
            publisher: SyncPublisher::new(channel.clone(), clock, config),
            channel,
            player,
            loop_controller: LoopController::new(config.auto_loop),
            observer: None,
            last_status: None,
            force_next: true,
        }
    }

    /// Session over the file-backed channel in `config.channel_dir()`.
    pub fn open(config: &SyncConfig, player: Arc<dyn Player>) -> Result<Self, ChannelError> {
        let channel = SharedChannel::open_dir(config.channel_dir())?;
        tracing::info!(
            key = %config.channel_key(),
            role = ?config.role,
            dir = ?config.channel_dir(),
            "sync session opened"
        );
        Ok(Self::new(config, channel, player, Arc::new(SystemClock)))
    }

    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn last_status(&self) -> Option<&PlayerStatus> {
        self.last_status.as_ref()
    }

    pub fn set_auto_loop(&mut self, enabled: bool) {
        self.loop_controller.set_enabled(enabled);
    }

    pub fn set_video_id(&mut self, video_id: impl Into<String>) {
        self.publisher.set_video_id(video_id);
    }

    /// Publish the next status regardless of what changed.
    pub fn request_full_sync(&mut self) {
        self.force_next = true;
    }

    /// Feed one local status update through the session.
    ///
    /// Returns `true` if a record was published.
    pub fn handle_status(&mut self, status: &PlayerStatus) -> bool {
        self.loop_controller.on_status(self.player.as_ref(), status);

        let published = match self.config.role {
            Role::Controller => {
                let force = std::mem::take(&mut self.force_next);
                self.publisher.on_status(status, force)
            }
            Role::Projection => false,
        };

        self.last_status = Some(status.clone());
        if let Some(observer) = &self.observer {
            observer(status);
        }
        published
    }

    /// Seek the local player and, as controller, publish the seek.
    ///
    /// Returns whether a record was published.
    pub fn seek_with_sync(&mut self, seconds: f64, allow_seek_ahead: bool) -> Result<bool, PlayerError> {
        self.player.seek_to(seconds, allow_seek_ahead)?;
        Ok(match self.config.role {
            Role::Controller => self.publisher.publish_seek(seconds),
            Role::Projection => false,
        })
    }

    /// Start following the controller. Projection sessions only.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_following(&self) -> Option<SubscriberHandle> {
        if self.config.role != Role::Projection {
            tracing::debug!(key = %self.config.channel_key(), "controller session does not follow");
            return None;
        }
        let subscriber = SyncSubscriber::new(self.channel.clone(), &self.config);
        Some(subscriber.spawn(self.player.clone(), self.config.poll_interval))
    }
}
