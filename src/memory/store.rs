//! `SqliteStore` — durable conversation / message / summary records.
//!
//! Repository-style data access over rusqlite: one struct holding the
//! database path, a fresh connection per operation (WAL + foreign-keys +
//! busy timeout), and exactly the operations the memory manager needs.
//! Messages are append-only; the only delete path is the FK cascade when a
//! conversation row is removed out-of-band.
//!
//! Timestamps are RFC 3339 at second precision, which ties for rows written
//! in the same second — every ordered query tiebreaks on `rowid` (insertion
//! order) to stay deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::AppError;
use crate::llm::Role;

/// Schema version stored in `PRAGMA user_version`.
/// Increment when the DDL changes; add a migration path in `open`.
const SCHEMA_VERSION: i64 = 1;

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A durable message row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Approximate token count, from [`crate::tokens::estimate_tokens`].
    pub tokens: u32,
    pub created_at: String,
}

/// Reserved extension point — rows are written by `save_summary` but nothing
/// in this crate produces summaries yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub id: String,
    pub conversation_id: String,
    pub summary: String,
    pub last_message_id: Option<String>,
    pub created_at: String,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Blocking SQLite repository. Cheap to clone; connections are per-call.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and apply the
    /// v1 schema. Parent directories are created.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let store = Self { db_path: db_path.to_path_buf() };
        let conn = store.open_conn()?;
        init_schema(&conn)?;
        Ok(store)
    }

    /// Open a connection and apply recommended pragmas.
    ///
    /// - `journal_mode = WAL` — readers don't block the writer.
    /// - `foreign_keys = ON` — message/summary rows must reference a live
    ///   conversation, and deleting one cascades.
    /// - `busy_timeout = 5000` — wait up to 5 s before `SQLITE_BUSY`.
    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| AppError::Store(format!("open {}: {e}", self.db_path.display())))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Store(format!("set foreign_keys ON: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("set busy_timeout: {e}")))?;

        Ok(conn)
    }

    // ── Conversations ─────────────────────────────────────────────────

    pub fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, AppError> {
        let conv = Conversation {
            id: uuid::Uuid::now_v7().to_string(),
            title: title.map(str::to_string),
            created_at: now_iso8601(),
            updated_at: now_iso8601(),
        };

        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![conv.id, conv.title, conv.created_at, conv.updated_at],
        )
        .map_err(|e| AppError::Store(format!("insert conversation: {e}")))?;

        Ok(conv)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, AppError> {
        let conn = self.open_conn()?;
        conn.query_row(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
            params![id],
            conversation_from_row,
        )
        .optional()
        .map_err(|e| AppError::Store(format!("get conversation {id}: {e}")))
    }

    /// All conversations, most recently updated first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, created_at, updated_at FROM conversations
                 ORDER BY updated_at DESC, rowid DESC",
            )
            .map_err(|e| AppError::Store(format!("prepare list conversations: {e}")))?;
        let rows = stmt
            .query_map([], conversation_from_row)
            .map_err(|e| AppError::Store(format!("list conversations: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("read conversation row: {e}")))
    }

    // ── Messages ──────────────────────────────────────────────────────

    pub fn insert_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        tokens: u32,
    ) -> Result<StoredMessage, AppError> {
        let message = StoredMessage {
            id: uuid::Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            tokens,
            created_at: now_iso8601(),
        };

        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                message.conversation_id,
                message.role.as_str(),
                message.content,
                message.tokens,
                message.created_at,
            ],
        )
        .map_err(|e| AppError::Store(format!("insert message: {e}")))?;

        Ok(message)
    }

    /// A conversation's messages, oldest first, capped at `limit`.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, tokens, created_at FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Store(format!("prepare list messages: {e}")))?;
        let rows = stmt
            .query_map(params![conversation_id, limit as i64], message_from_row)
            .map_err(|e| AppError::Store(format!("list messages: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("read message row: {e}")))
    }

    /// Substring search over message content across all conversations,
    /// newest first. LIKE semantics follow the store default
    /// (case-insensitive for ASCII).
    pub fn search_messages(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let pattern = format!("%{query}%");
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, tokens, created_at FROM messages
                 WHERE content LIKE ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Store(format!("prepare search messages: {e}")))?;
        let rows = stmt
            .query_map(params![pattern, limit as i64], message_from_row)
            .map_err(|e| AppError::Store(format!("search messages: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("read message row: {e}")))
    }

    // ── Summaries ─────────────────────────────────────────────────────

    pub fn insert_summary(
        &self,
        conversation_id: &str,
        summary: &str,
        last_message_id: Option<&str>,
    ) -> Result<Summary, AppError> {
        let record = Summary {
            id: uuid::Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            summary: summary.to_string(),
            last_message_id: last_message_id.map(str::to_string),
            created_at: now_iso8601(),
        };

        let conn = self.open_conn()?;
        conn.execute(
            "INSERT INTO summaries (id, conversation_id, summary, last_message_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.conversation_id,
                record.summary,
                record.last_message_id,
                record.created_at,
            ],
        )
        .map_err(|e| AppError::Store(format!("insert summary: {e}")))?;

        Ok(record)
    }

    /// A conversation's summaries, oldest first.
    pub fn list_summaries(&self, conversation_id: &str) -> Result<Vec<Summary>, AppError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, summary, last_message_id, created_at FROM summaries
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| AppError::Store(format!("prepare list summaries: {e}")))?;
        let rows = stmt
            .query_map(params![conversation_id], summary_from_row)
            .map_err(|e| AppError::Store(format!("list summaries: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("read summary row: {e}")))
    }
}

// ── Schema & row mapping ──────────────────────────────────────────────────────

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            title TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL
                REFERENCES conversations(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            tokens INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS summaries (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL
                REFERENCES conversations(id) ON DELETE CASCADE,
            summary TEXT NOT NULL,
            last_message_id TEXT,
            created_at TEXT NOT NULL
        );

        PRAGMA user_version = {SCHEMA_VERSION};
        "
    ))
    .map_err(|e| AppError::Store(format!("initialize schema: {e}")))
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role_str: String = row.get(2)?;
    let role = Role::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown role '{role_str}'").into(),
        )
    })?;
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role,
        content: row.get(3)?,
        tokens: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<Summary> {
    Ok(Summary {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        summary: row.get(2)?,
        last_message_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Current UTC time as an RFC 3339 string with second precision.
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
