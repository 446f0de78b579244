//! Collaborator contracts consumed by the turn pipeline
//!
//! Transcription, history, generation, synthesis and persistence are all
//! external capabilities. The pipeline only sees these traits; concrete
//! adapters live in [`crate::voice`], [`crate::llm`] and [`crate::db`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::emotion::Emotion;

/// Output of a transcription call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Transcribed text, `None` when nothing intelligible was heard
    pub text: Option<String>,
    /// Detected language tag, if the engine reported one
    pub language: Option<String>,
}

impl Transcript {
    /// Transcript with text and no language hint
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            language: None,
        }
    }

    /// Set the detected language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the engine is unreachable or rejects the audio
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// One prior turn as seen by the pattern detector and prompt composer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Stored emotion label; `None` if the stored value was not recognised
    pub emotion: Option<Emotion>,
    pub user_message: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to a user's prior turns
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent turns for a user, newest first, at most `limit`
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// Text generation capability
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate a reply to `user_message` under the `prompt` system instruction
    ///
    /// Returns `Ok(None)` when the engine answered without content.
    ///
    /// # Errors
    ///
    /// Returns error if the engine is unreachable or misconfigured
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<Option<String>>;
}

/// Text-to-speech capability
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// Returns `Ok(None)` when the engine produced no audio.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Option<Vec<u8>>>;
}

/// A completed turn, written once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub user_id: String,
    pub user_message: String,
    pub assistant_message: String,
    pub emotion: Emotion,
    pub emotion_score: f64,
    pub voice_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Write access for completed turns
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append a turn record
    ///
    /// # Errors
    ///
    /// Returns error if the record could not be written
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()>;
}
