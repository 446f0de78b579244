//! Heartline - Emotion-aware voice companion backend
//!
//! This library provides the core functionality for Heartline:
//! - Emotion classification of transcribed speech
//! - Emotional pattern detection over recent history
//! - Prompt composition and emotion-aware voice selection
//! - The turn pipeline that ties transcription, generation and synthesis together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  HTTP API (axum)                     │
//! │   /api/process-audio  │  /api/history  │  /api/user │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Turn Orchestrator                     │
//! │  Emotion  │  Patterns  │  Prompt  │  Voice Selector │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Collaborators                       │
//! │   STT  │  LLM  │  TTS  │  SQLite history store      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod emotion;
pub mod error;
pub mod language;
pub mod llm;
pub mod pattern;
pub mod ports;
pub mod prompt;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use db::{DbConn, DbPool};
pub use emotion::{Emotion, EmotionClassifier, EmotionResult};
pub use error::{Error, Result};
pub use language::Language;
pub use pattern::{PatternFinding, PatternKind};
pub use ports::{
    ConversationTurn, HistoryEntry, HistoryStore, ResponseGenerator, SpeechSynthesizer,
    Transcriber, Transcript, TurnStore,
};
pub use prompt::PromptComposer;
pub use turn::{Collaborators, Degradation, TurnFailure, TurnOrchestrator, TurnResult};
pub use voice::{VoiceChoice, VoiceProfile, VoiceSelector};
