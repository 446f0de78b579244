//! Conversation repository
//!
//! Stores one row per completed turn and serves the recent-history window
//! the pipeline reads before composing a prompt.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Row, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use super::DbPool;
use super::user::parse_datetime;
use crate::emotion::Emotion;
use crate::ports::{ConversationTurn, HistoryEntry, HistoryStore, TurnStore};
use crate::{Error, Result};

/// A stored turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub user_message: String,
    pub assistant_message: String,
    /// Emotion label as stored
    pub emotion: String,
    pub emotion_score: f64,
    pub voice_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Stored label parsed into a known emotion
    #[must_use]
    pub fn parsed_emotion(&self) -> Option<Emotion> {
        Emotion::parse(&self.emotion)
    }
}

impl From<ConversationRecord> for HistoryEntry {
    fn from(record: ConversationRecord) -> Self {
        Self {
            emotion: record.parsed_emotion(),
            user_message: record.user_message,
            created_at: record.created_at,
        }
    }
}

const RECORD_COLUMNS: &str = "id, user_id, user_message, assistant_message, emotion, \
                              emotion_score, voice_used, created_at";

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a completed turn
    ///
    /// Runs in a transaction; nothing is written if any step fails.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, turn: &ConversationTurn) -> Result<ConversationRecord> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        // The seq read and the insert must hold the write lock together
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(e.to_string()))?;

        let seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM conversations WHERE user_id = ?1",
                [&turn.user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: turn.user_id.clone(),
            user_message: turn.user_message.clone(),
            assistant_message: turn.assistant_message.clone(),
            emotion: turn.emotion.as_str().to_string(),
            emotion_score: turn.emotion_score,
            voice_used: turn.voice_used.clone(),
            created_at: turn.created_at,
        };

        tx.execute(
            "INSERT INTO conversations
                (id, user_id, user_message, assistant_message, emotion, emotion_score,
                 voice_used, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.id,
                record.user_id,
                record.user_message,
                record.assistant_message,
                record.emotion,
                record.emotion_score,
                record.voice_used,
                format_datetime(record.created_at),
                seq,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(id = %record.id, user_id = %record.user_id, seq, "turn stored");
        Ok(record)
    }

    /// Most recent turns for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM conversations
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?2"
            ))
            .map_err(|e| Error::Database(e.to_string()))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(rusqlite::params![user_id, limit], row_to_record)
            .map_err(|e| Error::Database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(records)
    }

    /// Most recent turns for a user in chronological order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationRecord>> {
        let mut records = self.recent(user_id, limit)?;
        records.reverse();
        Ok(records)
    }

    /// Number of stored turns for a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self, user_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl HistoryStore for ConversationRepo {
    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let repo = self.clone();
        let user_id = user_id.to_string();
        let records = tokio::task::spawn_blocking(move || repo.recent(&user_id, limit))
            .await
            .map_err(|e| Error::Database(format!("history read task failed: {e}")))??;

        Ok(records.into_iter().map(HistoryEntry::from).collect())
    }
}

#[async_trait]
impl TurnStore for ConversationRepo {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let repo = self.clone();
        let turn = turn.clone();
        tokio::task::spawn_blocking(move || repo.append(&turn))
            .await
            .map_err(|e| Error::Database(format!("append task failed: {e}")))??;
        Ok(())
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_message: row.get(2)?,
        assistant_message: row.get(3)?,
        emotion: row.get(4)?,
        emotion_score: row.get(5)?,
        voice_used: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

/// Fixed-width timestamps so text ordering matches time ordering
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
