//! Shared test utilities

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use heartline::api::{AuthError, Claims, TokenVerifier};
use heartline::db::{User, UserProfile, UserRepo};
use heartline::{
    ConversationTurn, DbPool, Emotion, Error, HistoryEntry, HistoryStore, ResponseGenerator,
    Result, SpeechSynthesizer, Transcriber, Transcript, TurnStore, db,
};

/// Token accepted by [`StaticVerifier`]
pub const VALID_TOKEN: &str = "valid-token";

/// Audio bytes returned by [`FakeSynthesizer`]
pub const FAKE_AUDIO: &[u8] = b"ID3-fake-mp3";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a test user in the database
pub fn create_test_user(db: &DbPool, subject: &str) -> User {
    let repo = UserRepo::new(db.clone());
    repo.find_or_create(&UserProfile {
        subject: subject.to_string(),
        name: Some("Test User".to_string()),
        ..UserProfile::default()
    })
    .expect("failed to create test user")
}

/// History entries, newest first, one minute apart
pub fn history_of(emotions: &[Emotion]) -> Vec<HistoryEntry> {
    let now = Utc::now();
    emotions
        .iter()
        .zip(0i64..)
        .map(|(emotion, i)| HistoryEntry {
            emotion: Some(*emotion),
            user_message: format!("earlier turn {i}"),
            created_at: now - TimeDelta::minutes(i + 1),
        })
        .collect()
}

enum TranscriberMode {
    Text(Transcript),
    Fail,
    Hang,
}

/// Transcriber returning a canned transcript
pub struct FakeTranscriber {
    mode: TranscriberMode,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    fn with_mode(mode: TranscriberMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with_mode(TranscriberMode::Text(Transcript::text(text)))
    }

    pub fn with_language(text: &str, language: &str) -> Self {
        Self::with_mode(TranscriberMode::Text(
            Transcript::text(text).with_language(language),
        ))
    }

    pub fn silent() -> Self {
        Self::with_mode(TranscriberMode::Text(Transcript::default()))
    }

    pub fn failing() -> Self {
        Self::with_mode(TranscriberMode::Fail)
    }

    pub fn hanging() -> Self {
        Self::with_mode(TranscriberMode::Hang)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            TranscriberMode::Text(transcript) => Ok(transcript.clone()),
            TranscriberMode::Fail => Err(Error::Stt("connection refused".to_string())),
            TranscriberMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Transcript::default())
            }
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// History store serving fixed entries
pub struct FakeHistory {
    entries: Vec<HistoryEntry>,
    fail: bool,
}

impl FakeHistory {
    pub fn empty() -> Self {
        Self::of(Vec::new())
    }

    pub fn of(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl HistoryStore for FakeHistory {
    async fn recent_turns(&self, _user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if self.fail {
            return Err(Error::Database("database is locked".to_string()));
        }
        Ok(self.entries.iter().take(limit).cloned().collect())
    }
}

/// Generator that records every prompt it receives
pub struct RecordingGenerator {
    reply: Option<String>,
    fail: bool,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self {
            reply: None,
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(p, _)| p.clone())
    }
}

#[async_trait]
impl ResponseGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<Option<String>> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), user_message.to_string()));
        if self.fail {
            return Err(Error::Llm("HTTP 503".to_string()));
        }
        Ok(self.reply.clone())
    }
}

/// Synthesizer returning [`FAKE_AUDIO`] and recording the voices used
#[derive(Default)]
pub struct FakeSynthesizer {
    fail: bool,
    hang: bool,
    pub voices: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Never finishes synthesizing
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.voices.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str, voice_id: &str) -> Result<Option<Vec<u8>>> {
        self.voices.lock().unwrap().push(voice_id.to_string());
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail {
            return Err(Error::Tts("quota exceeded".to_string()));
        }
        Ok(Some(FAKE_AUDIO.to_vec()))
    }
}

/// Turn store keeping records in memory
#[derive(Default)]
pub struct RecordingStore {
    fail: bool,
    pub turns: Mutex<Vec<ConversationTurn>>,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            turns: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl TurnStore for RecordingStore {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        if self.fail {
            return Err(Error::Database("disk I/O error".to_string()));
        }
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }
}

/// Verifier accepting only [`VALID_TOKEN`]
pub struct StaticVerifier {
    pub claims: Claims,
}

impl StaticVerifier {
    pub fn for_subject(subject: &str) -> Self {
        Self {
            claims: Claims {
                sub: subject.to_string(),
                email: Some("someone@example.com".to_string()),
                nickname: Some("someone".to_string()),
                ..Claims::default()
            },
        }
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        if token == VALID_TOKEN {
            Ok(self.claims.clone())
        } else {
            Err(AuthError::InvalidToken("signature mismatch".to_string()))
        }
    }
}
