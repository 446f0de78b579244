//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Users, keyed by identity provider subject
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            auth_subject TEXT NOT NULL UNIQUE,
            email TEXT,
            name TEXT,
            picture TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per completed turn
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            user_message TEXT NOT NULL,
            assistant_message TEXT NOT NULL,
            emotion TEXT NOT NULL,
            emotion_score REAL NOT NULL DEFAULT 0,
            voice_used TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            -- Per-user insertion order, breaks created_at ties
            seq INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations(user_id, created_at DESC, seq DESC);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}
