//! Durable local key/value storage for unsaved drafts.

mod log;

pub use log::{KvLog, StoreEntry};

use std::io;
use std::path::Path;
use std::sync::Mutex;

use dashmap::DashMap;
use tracing::debug;

use crate::limits::MAX_DRAFT_BYTES;

#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Serialization(String),
    QuotaExceeded { key: String, bytes: usize },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Serialization(e) => write!(f, "draft serialization failed: {e}"),
            StoreError::QuotaExceeded { key, bytes } => {
                write!(f, "value for {key} is {bytes} bytes, over the {MAX_DRAFT_BYTES} byte quota")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Local string store, like a browser's localStorage.
pub trait DraftStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

fn check_quota(key: &str, value: &str) -> Result<(), StoreError> {
    if value.len() > MAX_DRAFT_BYTES {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            bytes: value.len(),
        });
    }
    Ok(())
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DraftStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        check_quota(key, value)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by an append-only [`KvLog`]. The full key set is kept in
/// memory; the log is replayed on open and compacted once it has seen
/// `compact_threshold` appends.
pub struct FileStore {
    entries: DashMap<String, String>,
    log: Mutex<KvLog>,
    compact_threshold: u64,
}

impl FileStore {
    pub fn open(path: &Path, compact_threshold: u64) -> Result<Self, StoreError> {
        let entries = DashMap::new();
        for entry in KvLog::replay(path)? {
            match entry {
                StoreEntry::Set { key, value } => {
                    entries.insert(key, value);
                }
                StoreEntry::Remove { key } => {
                    entries.remove(&key);
                }
            }
        }
        let log = KvLog::open(path)?;
        debug!("opened draft store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            entries,
            log: Mutex::new(log),
            compact_threshold,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write(&self, entry: StoreEntry) -> Result<(), StoreError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| StoreError::Io("store lock poisoned".into()))?;
        log.append(&entry)?;
        match entry {
            StoreEntry::Set { key, value } => {
                self.entries.insert(key, value);
            }
            StoreEntry::Remove { key } => {
                self.entries.remove(&key);
            }
        }
        if log.appends_since_compact() >= self.compact_threshold {
            self.compact(&mut log)?;
        }
        Ok(())
    }

    fn compact(&self, log: &mut KvLog) -> Result<(), StoreError> {
        let live: Vec<StoreEntry> = self
            .entries
            .iter()
            .map(|e| StoreEntry::Set {
                key: e.key().clone(),
                value: e.value().clone(),
            })
            .collect();
        KvLog::write_compact_file(log.path(), &live)?;
        log.swap_compact_file()?;
        metrics::counter!(crate::observability::STORE_COMPACTIONS_TOTAL).increment(1);
        debug!("compacted draft store to {} keys", live.len());
        Ok(())
    }
}

impl DraftStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        check_quota(key, value)?;
        self.write(StoreEntry::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.write(StoreEntry::Remove {
            key: key.to_string(),
        })
    }
}
