//! Error types for Heartline

use thiserror::Error;

/// Result type alias for Heartline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Heartline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Response generation error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Sentiment scoring error
    #[error("sentiment error: {0}")]
    Sentiment(String),

    /// A collaborator call exceeded its deadline
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Authentication/authorization error
    #[error("auth error: {0}")]
    Auth(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
