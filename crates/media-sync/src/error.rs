//! Error types for media-sync.

/// Failures talking to the shared slot storage.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("encode sync record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("change watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Failures reported by the local player capability.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player offline")]
    Offline,

    #[error("player rejected {command}: {reason}")]
    Rejected {
        command: &'static str,
        reason: String,
    },
}
