//! File-backed slot store.
//!
//! Each key maps to one small JSON file in a shared directory. Writes go
//! through a temp file and a rename so readers never observe a partial
//! payload. Other processes' writes are detected with a directory watcher.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::{ChangeListener, SlotStore};
use crate::error::ChannelError;

/// Slot store rooted at a directory. One instance per execution context.
pub struct FileStore {
    dir: PathBuf,
    own_writes: Arc<Mutex<HashMap<String, String>>>,
}

impl FileStore {
    /// Open (and create if needed) the slot directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            own_writes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(slot_file_name(key))
    }
}

/// File name for a key, with anything outside `[A-Za-z0-9._-]` replaced.
fn slot_file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.json")
}

impl SlotStore for FileStore {
    fn write(&self, key: &str, payload: &str) -> Result<(), ChannelError> {
        let path = self.slot_path(key);
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            slot_file_name(key),
            std::process::id()
        ));
        // Record before the rename so the watcher sees our payload as our own.
        if let Ok(mut own) = self.own_writes.lock() {
            own.insert(key.to_string(), payload.to_string());
        }
        std::fs::write(&tmp, payload)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, ChannelError> {
        match std::fs::read_to_string(self.slot_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn watch(&self, key: &str) -> Result<ChangeListener, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.slot_path(key);
        let file_name: OsString = slot_file_name(key).into();
        let own_writes = self.own_writes.clone();
        let key_owned = key.to_string();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "slot watcher error");
                    return;
                }
            };
            if !touches_slot(&event, &file_name) {
                return;
            }
            let current = std::fs::read_to_string(&path).ok();
            if is_own_write(&own_writes, &key_owned, current.as_deref()) {
                return;
            }
            let _ = tx.send(());
        })?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        tracing::info!(key, dir = ?self.dir, "slot watcher started");

        let key_owned = key.to_string();
        Ok(ChangeListener::new(rx, move || {
            drop(watcher);
            tracing::debug!(key = %key_owned, "slot watcher stopped");
        }))
    }
}

fn touches_slot(event: &notify::Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn is_own_write(
    own_writes: &Mutex<HashMap<String, String>>,
    key: &str,
    current: Option<&str>,
) -> bool {
    let Some(current) = current else {
        return false;
    };
    own_writes
        .lock()
        .map(|own| own.get(key).map(String::as_str) == Some(current))
        .unwrap_or(false)
}
