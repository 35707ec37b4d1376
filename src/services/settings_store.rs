//! Settings store collaborators.
//!
//! The highlighting core only ever reads a [`SettingsSnapshot`], writes the
//! single enable flag, and listens for "something changed" notifications;
//! list and style edits are the popup's responsibility. Two implementations
//! ship: an in-memory store and a JSON-file-backed store.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::types::errors::StoreError;
use crate::types::settings::SettingsSnapshot;

/// Read attempts before a store read gives up.
pub const READ_ATTEMPTS: u32 = 3;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Trait defining the settings-store interface the core consumes.
#[async_trait]
pub trait SettingsStoreTrait: Send + Sync {
    /// Fetches the current snapshot.
    async fn read(&self) -> Result<SettingsSnapshot, StoreError>;

    /// Persists the highlighting enable flag (the only field the core
    /// writes) and notifies subscribers.
    async fn write_enable_highlighting(&self, enabled: bool) -> Result<(), StoreError>;

    /// Change notifications: one unit message per settings mutation.
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

// === MemoryStore ===

/// In-memory store. The embedder default, and what tests swap edits into.
pub struct MemoryStore {
    snapshot: RwLock<SettingsSnapshot>,
    changed: broadcast::Sender<()>,
}

impl MemoryStore {
    /// Creates a store holding the first-run snapshot (highlighting on,
    /// nothing configured).
    pub fn new() -> Self {
        Self::with_snapshot(SettingsSnapshot::first_run())
    }

    pub fn with_snapshot(snapshot: SettingsSnapshot) -> Self {
        let (changed, _) = broadcast::channel(16);
        Self {
            snapshot: RwLock::new(snapshot),
            changed,
        }
    }

    /// Replaces the whole snapshot and notifies subscribers. This is the
    /// popup's write path.
    pub async fn replace(&self, snapshot: SettingsSnapshot) {
        *self.snapshot.write().await = snapshot;
        let _ = self.changed.send(());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStoreTrait for MemoryStore {
    async fn read(&self) -> Result<SettingsSnapshot, StoreError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn write_enable_highlighting(&self, enabled: bool) -> Result<(), StoreError> {
        self.snapshot.write().await.enable_highlighting = enabled;
        let _ = self.changed.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }
}

// === JsonFileStore ===

/// Store persisting the snapshot as a JSON file at a caller-supplied path.
///
/// A missing file yields the first-run snapshot; a malformed file is
/// normalized field-by-field with safe defaults. Transient read failures are
/// retried a bounded number of times with exponential backoff.
pub struct JsonFileStore {
    path: PathBuf,
    changed: broadcast::Sender<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changed, _) = broadcast::channel(16);
        Self {
            path: path.into(),
            changed,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load_once(&self) -> Result<SettingsSnapshot, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(SettingsSnapshot::from_value(&value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(SettingsSnapshot::first_run())
            }
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn save(&self, snapshot: &SettingsSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl SettingsStoreTrait for JsonFileStore {
    async fn read(&self) -> Result<SettingsSnapshot, StoreError> {
        let mut last_error = None;
        for attempt in 1..=READ_ATTEMPTS {
            match self.load_once().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) => {
                    warn!(%err, attempt, "settings read failed");
                    last_error = Some(err);
                    if attempt < READ_ATTEMPTS {
                        let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                        sleep(backoff.min(BACKOFF_CAP)).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or(StoreError::Backend("read failed".to_string())))
    }

    async fn write_enable_highlighting(&self, enabled: bool) -> Result<(), StoreError> {
        let mut snapshot = self.load_once().await.unwrap_or_default();
        snapshot.enable_highlighting = enabled;
        self.save(&snapshot).await?;
        let _ = self.changed.send(());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }
}
