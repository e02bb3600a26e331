//! Cross-context media playback sync.
//!
//! A controller context publishes its player's meaningful state changes to a
//! single-slot shared channel; projection contexts poll and watch that slot
//! and reconcile their own players toward it. Looping on end of media is
//! handled locally in every context.

pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod loop_control;
pub mod player;
pub mod publisher;
pub mod reconcile;
pub mod session;
pub mod subscriber;

#[cfg(test)]
mod test_support;

pub use channel::{FileStore, MemoryStore, ReadOutcome, SharedChannel, SlotStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Role, SyncConfig, Thresholds};
pub use error::{ChannelError, PlayerError};
pub use loop_control::LoopController;
pub use player::{ChannelPlayer, Player, PlayerCommand};
pub use publisher::SyncPublisher;
pub use reconcile::{ReconcileReport, Reconciler};
pub use session::SyncSession;
pub use subscriber::{SubscriberHandle, SyncOutcome, SyncSubscriber};

pub use media_sync_types::{MalformedRecord, PlayerState, PlayerStatus, SCHEMA_VERSION, SyncRecord};
