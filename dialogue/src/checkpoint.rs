//! Checkpoint stores.
//!
//! A checkpoint is the full [`ThreadState`] of one thread, written after
//! every turn. Loading an unknown thread yields an empty state rather than
//! an error, since that is simply a conversation's first turn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::CheckpointError;
use crate::state::{ThreadId, ThreadState};

/// Result type alias for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Durable storage for thread state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load a thread's state, or an empty state if none was saved.
    async fn load(&self, thread_id: &ThreadId) -> Result<ThreadState>;

    /// Overwrite a thread's snapshot with `state`.
    async fn save(&self, state: &ThreadState) -> Result<()>;
}

/// In-process store; state lives as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<ThreadId, ThreadState>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads.
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    /// Check if no thread has been saved.
    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<ThreadState> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_else(|| ThreadState::new(thread_id.clone())))
    }

    async fn save(&self, state: &ThreadState) -> Result<()> {
        self.threads
            .write()
            .await
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }
}

/// On-disk checkpoint format.
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointData {
    /// Version of the storage format.
    version: u32,

    /// The saved state.
    state: ThreadState,
}

impl CheckpointData {
    const CURRENT_VERSION: u32 = 1;
}

/// One pretty-printed JSON file per thread, in a single directory.
///
/// Writes go through a temp file and a rename, so a crash mid-write leaves
/// the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    /// Directory holding `<thread_id>.json` files.
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Open a store at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CheckpointError::CreateDirectory(format!("{}: {e}", root.display())))?;

        info!("Checkpoint store at {}", root.display());
        Ok(Self { root })
    }

    /// Default location (`<data dir>/casebook/threads`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("casebook").join("threads"))
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a thread's checkpoint file.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted, so an id can never
    /// name a file outside the store.
    fn thread_path(&self, thread_id: &ThreadId) -> Result<PathBuf> {
        let id = thread_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CheckpointError::InvalidThreadId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<ThreadState> {
        let path = self.thread_path(thread_id)?;

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint for thread {thread_id}, starting fresh");
                return Ok(ThreadState::new(thread_id.clone()));
            }
            Err(e) => {
                return Err(CheckpointError::ReadFile(format!("{}: {e}", path.display())));
            }
        };

        let data: CheckpointData = serde_json::from_str(&content)?;
        if data.version != CheckpointData::CURRENT_VERSION {
            warn!(
                "Checkpoint version mismatch for {thread_id}: found {}, expected {}",
                data.version,
                CheckpointData::CURRENT_VERSION
            );
        }
        if data.state.thread_id != *thread_id {
            return Err(CheckpointError::ThreadMismatch {
                expected: thread_id.to_string(),
                found: data.state.thread_id.to_string(),
            });
        }

        debug!(
            "Loaded checkpoint for thread {thread_id} ({} messages)",
            data.state.messages.len()
        );
        Ok(data.state)
    }

    async fn save(&self, state: &ThreadState) -> Result<()> {
        let path = self.thread_path(&state.thread_id)?;
        let data = CheckpointData {
            version: CheckpointData::CURRENT_VERSION,
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&data)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| CheckpointError::WriteFile(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CheckpointError::WriteFile(format!("{}: {e}", path.display())))?;

        debug!(
            "Saved checkpoint for thread {} ({} messages)",
            state.thread_id,
            state.messages.len()
        );
        Ok(())
    }
}
