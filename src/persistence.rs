//! Advisory state files
//!
//! Quota usage and key cooldowns are cached on disk so restarts do not
//! forget exhausted quotas. These files are advisory: a missing or corrupt
//! file must never prevent startup, and a failed write never fails the
//! in-memory operation that triggered it.

use crate::error::PersistenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Persisted quota usage for one provider on one quota day
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistedQuota {
    /// Total requests across the provider's models
    pub used: u32,
    /// Quota day the counts belong to ("YYYY-MM-DD" in the reference timezone)
    pub date: String,
    /// Per-model breakdown
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, u32>,
}

/// Quota file contents: `{ provider: { used, date, models } }`
pub type QuotaState = BTreeMap<String, PersistedQuota>;

/// Cooldown file contents: `{ provider: { redacted_key: until_epoch_ms } }`
pub type CooldownState = BTreeMap<String, BTreeMap<String, i64>>;

/// Storage backend for one kind of advisory state
#[async_trait]
pub trait StateStore<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Load the stored state; `Ok(None)` when nothing has been stored yet
    async fn load(&self) -> Result<Option<T>, PersistenceError>;

    async fn save(&self, state: &T) -> Result<(), PersistenceError>;

    /// Short label for logs and metrics
    fn label(&self) -> &str;
}

/// JSON file on local disk, written via a temp file and rename
///
/// Saves through one store (or its clones) are serialized, so concurrent
/// writers never share the temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    label: String,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl<T> StateStore<T> for JsonFileStore
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<T>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistenceError::Corrupt {
                path: self.path.display().to_string(),
                source,
            })
    }

    async fn save(&self, state: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(state).map_err(|source| PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let _guard = self.write_lock.lock().await;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(
            store = %self.label,
            path = %self.path.display(),
            "State file written"
        );
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// In-memory store used when persistence is disabled
///
/// Counts writes so callers can observe debouncing.
#[derive(Debug)]
pub struct MemoryStore<T> {
    state: Mutex<Option<T>>,
    writes: AtomicUsize,
    label: String,
}

impl<T> MemoryStore<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(None),
            writes: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Store pre-seeded with `state`, as if loaded from an earlier run
    pub fn with_state(label: impl Into<String>, state: T) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            writes: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Number of `save` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<T: Clone> MemoryStore<T> {
    /// Last saved (or seeded) state
    pub async fn snapshot(&self) -> Option<T> {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl<T> StateStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<T>, PersistenceError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &T) -> Result<(), PersistenceError> {
        *self.state.lock().await = Some(state.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
