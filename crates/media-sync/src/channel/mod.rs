//! Shared single-slot broadcast channel.
//!
//! A [`SlotStore`] is the raw medium: one string payload per key, last write
//! wins, plus notifications when *another* context writes. [`SharedChannel`]
//! layers the typed [`SyncRecord`] codec on top and contains storage failures
//! so they never reach callers as errors.

pub mod file;
pub mod memory;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ChannelError;
use media_sync_types::{MalformedRecord, SyncRecord};

pub use file::FileStore;
pub use memory::{MemoryContext, MemoryStore};

/// Raw persistent slot storage.
pub trait SlotStore: Send + Sync {
    /// Replace the payload stored under `key`.
    fn write(&self, key: &str, payload: &str) -> Result<(), ChannelError>;

    /// Current payload under `key`, `None` if never written.
    fn read(&self, key: &str) -> Result<Option<String>, ChannelError>;

    /// Listen for writes to `key` made by other contexts.
    fn watch(&self, key: &str) -> Result<ChangeListener, ChannelError>;
}

/// Change notifications for one key.
///
/// Dropping the listener unregisters it from the store.
pub struct ChangeListener {
    rx: mpsc::UnboundedReceiver<()>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ChangeListener {
    pub fn new<F>(rx: mpsc::UnboundedReceiver<()>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next external change. Returns `false` once the source is gone.
    pub async fn changed(&mut self) -> bool {
        if self.rx.recv().await.is_none() {
            return false;
        }
        // Collapse a burst into one wake-up; the slot only holds the latest value anyway.
        while self.rx.try_recv().is_ok() {}
        true
    }

    /// Drain pending notifications without waiting.
    pub fn try_changed(&mut self) -> bool {
        let mut any = false;
        while self.rx.try_recv().is_ok() {
            any = true;
        }
        any
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Result of reading the slot.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Nothing published yet.
    Absent,
    /// A valid record.
    Record(SyncRecord),
    /// Payload present but unusable.
    Malformed(MalformedRecord),
    /// Storage could not be read.
    Unavailable(ChannelError),
}

/// Typed view over a [`SlotStore`].
#[derive(Clone)]
pub struct SharedChannel {
    store: Arc<dyn SlotStore>,
}

impl SharedChannel {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    /// File-backed channel rooted at `dir`.
    pub fn open_dir(dir: impl Into<std::path::PathBuf>) -> Result<Self, ChannelError> {
        Ok(Self::new(Arc::new(FileStore::new(dir)?)))
    }

    /// Store `record` as the sole value under `key`.
    ///
    /// Returns `true` when the write went through. Failures are logged and
    /// swallowed.
    pub fn publish(&self, key: &str, record: &SyncRecord) -> bool {
        let payload = match record.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key, error = %e, "sync record encode failed");
                return false;
            }
        };
        match self.store.write(key, &payload) {
            Ok(()) => {
                tracing::debug!(
                    key,
                    last_updated = record.last_updated,
                    state = ?record.player_state,
                    current_time = record.current_time,
                    "sync record published"
                );
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "sync publish failed");
                false
            }
        }
    }

    /// Read and decode the record under `key`.
    pub fn read(&self, key: &str) -> ReadOutcome {
        match self.store.read(key) {
            Ok(None) => ReadOutcome::Absent,
            Ok(Some(raw)) => match SyncRecord::decode(&raw) {
                Ok(record) => ReadOutcome::Record(record),
                Err(e) => ReadOutcome::Malformed(e),
            },
            Err(e) => ReadOutcome::Unavailable(e),
        }
    }

    /// Register for writes to `key` from other contexts.
    ///
    /// Returns `None` when the medium cannot notify; callers fall back to polling.
    pub fn subscribe_to_external_changes(&self, key: &str) -> Option<ChangeListener> {
        match self.store.watch(key) {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::warn!(key, error = %e, "change notifications unavailable; polling only");
                None
            }
        }
    }
}
