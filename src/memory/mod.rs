//! Layered conversation memory.
//!
//! Two layers with different lifetimes:
//!
//! | layer      | where            | scope                         |
//! |------------|------------------|-------------------------------|
//! | short-term | [`ShortTermBuffer`] in RAM | last N turns, this process |
//! | long-term  | [`SqliteStore`] on disk    | full history, durable      |
//!
//! [`MemoryManager`] is the only writer to both. On each turn it persists
//! the durable record first, then mirrors the turn into the buffer
//! (write-then-mirror): a failed durable write leaves the buffer untouched,
//! and the two layers are deliberately not transactional with each other.
//!
//! Store calls are blocking rusqlite I/O, dispatched through
//! `tokio::task::spawn_blocking`; the buffer is plain owned state touched
//! only from the caller's single control flow.

pub mod buffer;
pub mod store;

pub use buffer::ShortTermBuffer;
pub use store::{Conversation, SqliteStore, StoredMessage, Summary};

use tracing::debug;

use crate::error::AppError;
use crate::llm::{ChatMessage, Role};
use crate::tokens::estimate_tokens;

/// Default cap for [`MemoryManager::long_term_history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;
/// Default cap for [`MemoryManager::search_simple`].
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Orchestrates the durable store and the in-RAM window.
///
/// Owns its buffer outright — independent managers share nothing, so tests
/// (and a future multi-session server) can run several side by side.
pub struct MemoryManager {
    store: SqliteStore,
    buffer: ShortTermBuffer,
}

impl MemoryManager {
    pub fn new(store: SqliteStore, short_memory_size: usize) -> Self {
        Self { store, buffer: ShortTermBuffer::new(short_memory_size) }
    }

    /// Create a durable conversation and its (empty) short-term window.
    pub async fn create_conversation(
        &mut self,
        title: Option<&str>,
    ) -> Result<Conversation, AppError> {
        let store = self.store.clone();
        let title = title.map(str::to_string);
        let conv = tokio::task::spawn_blocking(move || {
            store.create_conversation(title.as_deref())
        })
        .await
        .map_err(|e| AppError::Store(format!("create_conversation join: {e}")))??;

        self.buffer.ensure(&conv.id);
        debug!(conversation_id = %conv.id, title = ?conv.title, "conversation created");
        Ok(conv)
    }

    /// Persist one turn, then mirror it into the short-term window.
    ///
    /// The durable write happens first; if it fails the buffer is not
    /// touched. An empty `conversation_id` fails validation before any
    /// store access.
    pub async fn add_message(
        &mut self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, AppError> {
        if conversation_id.is_empty() {
            return Err(AppError::Validation("conversation id required".to_string()));
        }

        let tokens = estimate_tokens(content);

        let store = self.store.clone();
        let conv_id = conversation_id.to_string();
        let content_owned = content.to_string();
        let message = tokio::task::spawn_blocking(move || {
            store.insert_message(&conv_id, role, &content_owned, tokens)
        })
        .await
        .map_err(|e| AppError::Store(format!("add_message join: {e}")))??;

        self.buffer.append(conversation_id, ChatMessage::new(role, content));
        debug!(
            conversation_id,
            %role,
            tokens,
            message_id = %message.id,
            "message persisted and mirrored"
        );
        Ok(message)
    }

    /// The current short-term window, oldest first. RAM only.
    pub fn short_term_context(&mut self, conversation_id: &str) -> Vec<ChatMessage> {
        self.buffer.ensure(conversation_id);
        self.buffer.read(conversation_id)
    }

    /// Full durable history, oldest first, capped at `limit`.
    pub async fn long_term_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let store = self.store.clone();
        let conv_id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || store.list_messages(&conv_id, limit))
            .await
            .map_err(|e| AppError::Store(format!("long_term_history join: {e}")))?
    }

    /// Reset the short-term window. Durable records are untouched.
    /// Empty id is a silent no-op, matching the rest of the clear path.
    pub fn clear_short_term(&mut self, conversation_id: &str) {
        if conversation_id.is_empty() {
            return;
        }
        self.buffer.clear(conversation_id);
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, AppError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_conversations())
            .await
            .map_err(|e| AppError::Store(format!("list_conversations join: {e}")))?
    }

    pub async fn conversation_by_id(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        let store = self.store.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.get_conversation(&id))
            .await
            .map_err(|e| AppError::Store(format!("conversation_by_id join: {e}")))?
    }

    /// Store a summary record. Reserved extension point — nothing in this
    /// crate computes summaries yet.
    pub async fn save_summary(
        &self,
        conversation_id: &str,
        summary: &str,
        last_message_id: Option<&str>,
    ) -> Result<Summary, AppError> {
        let store = self.store.clone();
        let conv_id = conversation_id.to_string();
        let summary = summary.to_string();
        let last = last_message_id.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            store.insert_summary(&conv_id, &summary, last.as_deref())
        })
        .await
        .map_err(|e| AppError::Store(format!("save_summary join: {e}")))?
    }

    pub async fn summaries(&self, conversation_id: &str) -> Result<Vec<Summary>, AppError> {
        let store = self.store.clone();
        let conv_id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || store.list_summaries(&conv_id))
            .await
            .map_err(|e| AppError::Store(format!("summaries join: {e}")))?
    }

    /// Substring search over durable messages, newest first.
    /// An empty query returns an empty list without touching the store.
    pub async fn search_simple(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AppError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let store = self.store.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || store.search_messages(&query, limit))
            .await
            .map_err(|e| AppError::Store(format!("search_simple join: {e}")))?
    }
}
