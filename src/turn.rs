//! Conversation turn pipeline
//!
//! One turn runs these stages in order, each depending on the last:
//!
//! ```text
//! audio ─► transcribe ─► classify ─► history ─► patterns ─► compose
//!                                                              │
//!   record ◄─ persist ◄─ synthesize ◄─ select voice ◄─ generate ◄┘
//! ```
//!
//! Transcription and generation are critical: their failure aborts the turn
//! before any later collaborator runs and nothing is persisted. Every other
//! stage degrades and the turn still completes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::Error;
use crate::emotion::{EmotionClassifier, EmotionResult};
use crate::language;
use crate::pattern::{self, HISTORY_WINDOW, PatternFinding};
use crate::ports::{
    ConversationTurn, HistoryEntry, HistoryStore, ResponseGenerator, SpeechSynthesizer,
    Transcriber, TurnStore,
};
use crate::prompt::PromptComposer;
use crate::voice::{VoiceChoice, VoiceSelector};

/// Default deadline for each collaborator call
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipeline stage that talks to a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    History,
    Generation,
    Synthesis,
    Persistence,
}

impl Stage {
    /// Stage name for logs and error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::History => "history",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a turn ended without a reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnFailure {
    /// The caller's input cannot produce a turn
    #[error("{0}")]
    InputError(&'static str),

    /// A critical collaborator failed or timed out
    #[error("{stage} unavailable: {reason}")]
    UpstreamUnavailable { stage: Stage, reason: String },

    /// The generator answered without content
    #[error("generation failed")]
    GenerationFailed,
}

/// A non-critical failure the turn recovered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// History could not be read; the turn ran without context
    HistoryUnavailable,
    /// No voice tier for the language; English voices were used
    LanguageFallback { language: String },
    /// No usable voice id; synthesis was skipped
    NoVoice,
    /// Synthesis failed or returned no audio
    SynthesisFailed,
    /// The turn record could not be written
    PersistenceFailed,
}

/// Outcome of a single stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Stage succeeded
    Continue(T),
    /// Stage recovered with a fallback value
    DegradedContinue(T, Degradation),
    /// Stage failed terminally
    Abort(TurnFailure),
}

impl<T> StageOutcome<T> {
    /// Unwrap the stage value, recording any degradation
    ///
    /// # Errors
    ///
    /// Returns the failure for [`StageOutcome::Abort`]
    pub fn proceed(self, notes: &mut Vec<Degradation>) -> Result<T, TurnFailure> {
        match self {
            Self::Continue(value) => Ok(value),
            Self::DegradedContinue(value, degradation) => {
                notes.push(degradation);
                Ok(value)
            }
            Self::Abort(failure) => Err(failure),
        }
    }
}

/// Transcribed user speech
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    pub text: String,
    /// Normalised primary language subtag
    pub language: String,
}

/// Result of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub transcription: String,
    pub reply_text: String,
    pub emotion: EmotionResult,
    pub language: String,
    pub voice_id: Option<String>,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    pub findings: Vec<PatternFinding>,
    pub degradations: Vec<Degradation>,
}

impl TurnResult {
    /// Whether any stage fell back
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// External capabilities a turn depends on
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub history: Arc<dyn HistoryStore>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn TurnStore>,
}

/// Runs conversation turns
///
/// Holds no per-turn state; one instance serves concurrent turns.
#[derive(Clone)]
pub struct TurnOrchestrator {
    collaborators: Collaborators,
    classifier: EmotionClassifier,
    composer: PromptComposer,
    selector: VoiceSelector,
    stage_timeout: Duration,
}

impl TurnOrchestrator {
    /// Create an orchestrator with default classifier, persona and voices
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            classifier: EmotionClassifier::default(),
            composer: PromptComposer::default(),
            selector: VoiceSelector::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Use a custom emotion classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: EmotionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a custom prompt composer
    #[must_use]
    pub fn with_composer(mut self, composer: PromptComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Use a custom voice selector
    #[must_use]
    pub fn with_selector(mut self, selector: VoiceSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the per-call collaborator deadline
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Run one turn for `user_id` from raw audio
    ///
    /// Persistence is the last stage, so dropping the returned future
    /// before completion never leaves a partial record.
    ///
    /// # Errors
    ///
    /// Returns a [`TurnFailure`] when input is unusable or transcription or
    /// generation fails
    pub async fn run(&self, user_id: &str, audio: &[u8]) -> Result<TurnResult, TurnFailure> {
        let mut notes = Vec::new();
        tracing::info!(user_id, audio_bytes = audio.len(), "turn received");

        let utterance = self.transcribe(audio).await.proceed(&mut notes)?;
        tracing::debug!(user_id, language = %utterance.language, "transcribed");

        let emotion = self.classifier.classify(&utterance.text);
        tracing::info!(user_id, emotion = %emotion.label, valence = emotion.valence, "classified");

        let history = self.fetch_history(user_id).await.proceed(&mut notes)?;
        let findings = pattern::detect(&history, emotion.label);
        if !findings.is_empty() {
            tracing::info!(user_id, ?findings, "recurring emotion detected");
        }

        let prompt = self
            .composer
            .compose(emotion.label, &findings, &history, &utterance.language);

        let reply = self
            .generate(&prompt, &utterance.text)
            .await
            .proceed(&mut notes)?;

        let choice = self
            .select_voice(&emotion, &utterance.language, &reply)
            .proceed(&mut notes)?;
        if choice.language_fallback {
            notes.push(Degradation::LanguageFallback {
                language: utterance.language.clone(),
            });
        }

        let audio = match choice.voice_id.as_deref() {
            Some(voice_id) => self.synthesize(&reply, voice_id).await.proceed(&mut notes)?,
            None => None,
        };

        let turn = ConversationTurn {
            user_id: user_id.to_string(),
            user_message: utterance.text.clone(),
            assistant_message: reply.clone(),
            emotion: emotion.label,
            emotion_score: emotion.valence,
            voice_used: choice.voice_id.clone(),
            created_at: Utc::now(),
        };
        self.persist(&turn).await.proceed(&mut notes)?;

        tracing::info!(
            user_id,
            emotion = %emotion.label,
            voice = ?choice.voice_id,
            has_audio = audio.is_some(),
            degradations = notes.len(),
            "turn complete"
        );

        Ok(TurnResult {
            transcription: utterance.text,
            reply_text: reply,
            emotion,
            language: utterance.language,
            voice_id: choice.voice_id,
            audio,
            findings,
            degradations: notes,
        })
    }

    async fn transcribe(&self, audio: &[u8]) -> StageOutcome<Utterance> {
        if audio.is_empty() {
            return StageOutcome::Abort(TurnFailure::InputError("empty input"));
        }

        let transcriber = &self.collaborators.transcriber;
        let transcript = match self
            .guarded(Stage::Transcription, transcriber.transcribe(audio))
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::error!(provider = transcriber.name(), error = %e, "transcription failed");
                return StageOutcome::Abort(TurnFailure::UpstreamUnavailable {
                    stage: Stage::Transcription,
                    reason: e.to_string(),
                });
            }
        };

        let Some(text) = transcript
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
        else {
            tracing::warn!(provider = transcriber.name(), "transcription returned no text");
            return StageOutcome::Abort(TurnFailure::InputError("could not transcribe"));
        };

        StageOutcome::Continue(Utterance {
            text,
            language: language::normalize_tag(transcript.language.as_deref()),
        })
    }

    async fn fetch_history(&self, user_id: &str) -> StageOutcome<Vec<HistoryEntry>> {
        let history = &self.collaborators.history;
        match self
            .guarded(Stage::History, history.recent_turns(user_id, HISTORY_WINDOW))
            .await
        {
            Ok(mut entries) => {
                entries.truncate(HISTORY_WINDOW);
                StageOutcome::Continue(entries)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "history unavailable, continuing without it");
                StageOutcome::DegradedContinue(Vec::new(), Degradation::HistoryUnavailable)
            }
        }
    }

    async fn generate(&self, prompt: &str, user_message: &str) -> StageOutcome<String> {
        let generator = &self.collaborators.generator;
        match self
            .guarded(Stage::Generation, generator.generate(prompt, user_message))
            .await
        {
            Ok(Some(reply)) if !reply.trim().is_empty() => {
                StageOutcome::Continue(reply.trim().to_string())
            }
            Ok(_) => {
                tracing::error!("generator returned an empty reply");
                StageOutcome::Abort(TurnFailure::GenerationFailed)
            }
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                StageOutcome::Abort(TurnFailure::UpstreamUnavailable {
                    stage: Stage::Generation,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn select_voice(
        &self,
        emotion: &EmotionResult,
        language: &str,
        reply: &str,
    ) -> StageOutcome<VoiceChoice> {
        let choice = self.selector.select(emotion.label, language, reply);
        if choice.voice_id.is_none() {
            StageOutcome::DegradedContinue(choice, Degradation::NoVoice)
        } else {
            StageOutcome::Continue(choice)
        }
    }

    async fn synthesize(&self, reply: &str, voice_id: &str) -> StageOutcome<Option<Vec<u8>>> {
        let synthesizer = &self.collaborators.synthesizer;
        match self
            .guarded(Stage::Synthesis, synthesizer.synthesize(reply, voice_id))
            .await
        {
            Ok(Some(audio)) if !audio.is_empty() => StageOutcome::Continue(Some(audio)),
            Ok(_) => {
                tracing::warn!(voice = voice_id, "synthesis produced no audio");
                StageOutcome::DegradedContinue(None, Degradation::SynthesisFailed)
            }
            Err(e) => {
                tracing::warn!(
                    voice = voice_id,
                    error = %e,
                    "synthesis failed, replying with text only"
                );
                StageOutcome::DegradedContinue(None, Degradation::SynthesisFailed)
            }
        }
    }

    async fn persist(&self, turn: &ConversationTurn) -> StageOutcome<()> {
        match self
            .guarded(Stage::Persistence, self.collaborators.store.append_turn(turn))
            .await
        {
            Ok(()) => StageOutcome::Continue(()),
            Err(e) => {
                tracing::error!(user_id = %turn.user_id, error = %e, "failed to persist turn");
                StageOutcome::DegradedContinue((), Degradation::PersistenceFailed)
            }
        }
    }

    /// Bound a collaborator call by the stage deadline
    async fn guarded<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = crate::Result<T>>,
    ) -> crate::Result<T> {
        tokio::time::timeout(self.stage_timeout, call)
            .await
            .unwrap_or(Err(Error::Timeout(stage.as_str())))
    }
}
