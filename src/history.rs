//! Bounded message history mirrored to a JSON file.
//!
//! The store is synchronous (std::fs) and wrapped in `Arc<Mutex>` for thread
//! safety with `tokio::task::spawn_blocking` for the write path, the same
//! discipline used for any synchronous resource shared across handlers.
//! The whole file is rewritten on every append; at the configured history
//! sizes this is simpler and more crash-tolerant than incremental appends,
//! but it is the known scalability ceiling of this design.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Type alias for the shared history store.
pub type HistoryHandle = Arc<Mutex<HistoryStore>>;

/// One relayed message as recorded in history and on disk.
/// Immutable once recorded. The on-disk field name for the sender address
/// is `clientId`, matching the JSON array format of the durable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// ISO-8601 capture time, assigned at receipt.
    pub timestamp: String,
    /// Raw text payload, opaque to the relay.
    pub message: String,
    /// Sender's transport address ("ip:port") at receipt time.
    /// Record-keeping only — never used for routing.
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Bounded FIFO of the most recent messages, mirrored to `file_path`.
pub struct HistoryStore {
    entries: VecDeque<StoredMessage>,
    max_messages: usize,
    file_path: PathBuf,
    save_to_file: bool,
}

impl HistoryStore {
    /// Load the history file, tolerating absence and corruption.
    ///
    /// A missing file starts an empty history; an unreadable or unparseable
    /// file is logged and also starts empty. The file is a best-effort
    /// mirror, not a transaction log, so data loss here is acceptable.
    pub fn load(file_path: PathBuf, max_messages: usize, save_to_file: bool) -> Self {
        let mut entries: VecDeque<StoredMessage> = VecDeque::new();

        match std::fs::read_to_string(&file_path) {
            Ok(contents) => match serde_json::from_str::<Vec<StoredMessage>>(&contents) {
                Ok(stored) => {
                    entries.extend(stored);
                    tracing::info!(
                        count = entries.len(),
                        file = %file_path.display(),
                        "Loaded message history"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        file = %file_path.display(),
                        error = %e,
                        "Malformed history file, starting with empty history"
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    file = %file_path.display(),
                    "No history file, starting with empty history"
                );
            }
            Err(e) => {
                tracing::warn!(
                    file = %file_path.display(),
                    error = %e,
                    "Failed to read history file, starting with empty history"
                );
            }
        }

        // A previously larger limit may have persisted more entries than we
        // now retain; drop the oldest so the bound holds from the start.
        while entries.len() > max_messages {
            entries.pop_front();
        }

        Self {
            entries,
            max_messages,
            file_path,
            save_to_file,
        }
    }

    /// Create an empty store without touching the filesystem.
    pub fn empty(file_path: PathBuf, max_messages: usize, save_to_file: bool) -> Self {
        Self {
            entries: VecDeque::new(),
            max_messages,
            file_path,
            save_to_file,
        }
    }

    /// Wrap the store for sharing across handlers.
    pub fn into_handle(self) -> HistoryHandle {
        Arc::new(Mutex::new(self))
    }

    /// Append a message, evict from the front past `max_messages`, persist.
    pub fn append(&mut self, msg: StoredMessage) {
        self.entries.push_back(msg);
        while self.entries.len() > self.max_messages {
            self.entries.pop_front();
        }
        self.persist();
    }

    /// Rewrite the durable file with the full in-memory sequence.
    ///
    /// A write failure is logged and swallowed: history stays correct in
    /// memory and may diverge from disk until a later successful write.
    /// Persistence must never block broadcasting.
    pub fn persist(&self) {
        if !self.save_to_file {
            return;
        }

        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::error!(
                        file = %self.file_path.display(),
                        error = %e,
                        "Failed to save message history"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message history");
            }
        }
    }

    /// Ordered view of the raw message payloads (the export format).
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(|m| m.message.clone()).collect()
    }

    /// Ordered view of the full stored records.
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
