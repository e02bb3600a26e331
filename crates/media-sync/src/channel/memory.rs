//! In-process slot store.
//!
//! One [`MemoryStore`] stands in for the shared medium; each execution
//! context gets its own [`MemoryContext`] handle so notifications can skip
//! the writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{ChangeListener, SlotStore};
use crate::error::ChannelError;

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    slots: Mutex<HashMap<String, String>>,
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

struct Listener {
    id: u64,
    context: u64,
    key: String,
    tx: mpsc::UnboundedSender<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a new execution context sharing this store.
    pub fn context(&self) -> MemoryContext {
        MemoryContext {
            inner: self.inner.clone(),
            context: self.inner.next_id(),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of live change listeners across all contexts.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl MemoryInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    fn notify_others(&self, key: &str, writer: u64) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|l| {
                if l.key != key || l.context == writer {
                    return true;
                }
                l.tx.send(()).is_ok()
            });
        }
    }
}

/// One execution context's view of a [`MemoryStore`].
pub struct MemoryContext {
    inner: Arc<MemoryInner>,
    context: u64,
    failing: AtomicBool,
}

impl MemoryContext {
    /// Simulate storage being disabled for this context.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(ChannelError::Unavailable("storage disabled".to_string()));
        }
        Ok(())
    }
}

impl SlotStore for MemoryContext {
    fn write(&self, key: &str, payload: &str) -> Result<(), ChannelError> {
        self.check_available()?;
        {
            let mut slots = self
                .inner
                .slots
                .lock()
                .map_err(|_| ChannelError::Unavailable("slot lock poisoned".to_string()))?;
            slots.insert(key.to_string(), payload.to_string());
        }
        self.inner.notify_others(key, self.context);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, ChannelError> {
        self.check_available()?;
        let slots = self
            .inner
            .slots
            .lock()
            .map_err(|_| ChannelError::Unavailable("slot lock poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn watch(&self, key: &str) -> Result<ChangeListener, ChannelError> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id();
        self.inner
            .listeners
            .lock()
            .map_err(|_| ChannelError::Unavailable("listener lock poisoned".to_string()))?
            .push(Listener {
                id,
                context: self.context,
                key: key.to_string(),
                tx,
            });
        let inner = self.inner.clone();
        Ok(ChangeListener::new(rx, move || {
            if let Ok(mut listeners) = inner.listeners.lock() {
                listeners.retain(|l| l.id != id);
            }
        }))
    }
}
