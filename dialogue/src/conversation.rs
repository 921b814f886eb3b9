//! The conversation entry point.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::controller::DialogueController;
use crate::error::Result;
use crate::message::Message;
use crate::state::ThreadId;

/// Answers user turns, one thread at a time per thread id.
///
/// Each call to [`Conversation::respond`] loads the thread's checkpoint,
/// runs the controller and saves the result while holding that thread's
/// lock, so two turns on one thread can never interleave. Turns on
/// different threads run concurrently.
pub struct Conversation {
    controller: DialogueController,
    store: Arc<dyn CheckpointStore>,
    locks: Mutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

impl Conversation {
    /// Create a conversation over a controller and a checkpoint store.
    pub fn new(controller: DialogueController, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            controller,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the controller.
    pub fn controller(&self) -> &DialogueController {
        &self.controller
    }

    /// Answer one user utterance on a thread.
    ///
    /// Only checkpoint failures are returned as errors; retrieval, generator
    /// and tool failures are part of the answer.
    pub async fn respond(&self, thread_id: &ThreadId, input: &str) -> Result<String> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(thread_id, input).await
        };
        self.release_lock(thread_id, lock).await;
        result
    }

    /// Persisted history of a thread.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.store.load(thread_id).await
        };
        self.release_lock(thread_id, lock).await;
        Ok(result?.messages)
    }

    async fn run_locked(&self, thread_id: &ThreadId, input: &str) -> Result<String> {
        let mut state = self.store.load(thread_id).await?;
        let before = state.messages.len();

        let report = self.controller.run_turn(&mut state, input).await;
        self.store.save(&state).await?;

        info!(
            "Thread {thread_id}: turn added {} messages",
            state.messages.len() - before
        );
        Ok(report.answer)
    }

    async fn thread_lock(&self, thread_id: &ThreadId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(thread_id.clone())
            .or_default()
            .clone()
    }

    /// Drop the table entry once no other caller holds or waits on it.
    ///
    /// Handles are only cloned under the table lock, so a count of two (the
    /// table's and ours) means nobody else can reach this mutex.
    async fn release_lock(&self, thread_id: &ThreadId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(thread_id);
        }
    }
}
