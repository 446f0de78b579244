//! System prompt composition for the response generator
//!
//! Prompt layout, in order:
//! 1. Persona base text
//! 2. Language directive
//! 3. Emotion guidance
//! 4. Pattern acknowledgments (one per finding)
//! 5. Recap of recent emotions

use crate::emotion::Emotion;
use crate::language::Language;
use crate::pattern::{PatternFinding, PatternKind};
use crate::ports::HistoryEntry;

/// Persona used when none is configured
pub const DEFAULT_PERSONA: &str = "You are a compassionate AI companion who provides emotional support with genuine care.
You remember the user's history and emotional patterns.
Sound like a caring friend, not a robot.";

/// Guidance used for labels outside the known set
pub const FALLBACK_GUIDANCE: &str = "Be empathetic.";

/// Maximum number of past emotions recapped in the prompt
pub const RECAP_LEN: usize = 5;

/// One-line guidance for an emotion
#[must_use]
pub const fn emotion_guidance(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Happy => "The user is happy! Celebrate with them.",
        Emotion::Positive => "The user is in a good mood. Be upbeat.",
        Emotion::Neutral => "The user seems neutral. Be balanced.",
        Emotion::Sad => "The user is sad. Be deeply empathetic and comforting.",
        Emotion::Angry => "The user is frustrated. Be calm and understanding.",
    }
}

/// Guidance for a raw label, with [`FALLBACK_GUIDANCE`] for unknown labels
#[must_use]
pub fn guidance_for_label(label: &str) -> &'static str {
    Emotion::parse(label).map_or(FALLBACK_GUIDANCE, emotion_guidance)
}

/// Builds the system prompt for one turn
#[derive(Debug, Clone)]
pub struct PromptComposer {
    persona: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl PromptComposer {
    /// Create a composer with the given persona text
    ///
    /// Blank persona text falls back to [`DEFAULT_PERSONA`].
    #[must_use]
    pub fn new(persona: impl Into<String>) -> Self {
        let persona = persona.into();
        let persona = if persona.trim().is_empty() {
            DEFAULT_PERSONA.to_string()
        } else {
            persona.trim().to_string()
        };
        Self { persona }
    }

    /// Persona base text
    #[must_use]
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Compose the system prompt
    ///
    /// `history` is newest first; `language` is a normalised tag.
    #[must_use]
    pub fn compose(
        &self,
        emotion: Emotion,
        findings: &[PatternFinding],
        history: &[HistoryEntry],
        language: &str,
    ) -> String {
        let mut sections = Vec::with_capacity(5);

        sections.push(self.persona.clone());
        sections.push(language_directive(language));
        sections.push(emotion_guidance(emotion).to_string());

        for finding in findings {
            sections.push(acknowledge(finding));
        }

        if let Some(recap) = recap(history) {
            sections.push(recap);
        }

        sections.join("\n\n")
    }
}

fn language_directive(language: &str) -> String {
    let name = Language::resolve(language).name();
    format!("Respond in {name}. Keep it concise, 2-3 sentences, and natural.")
}

fn acknowledge(finding: &PatternFinding) -> String {
    match finding.kind {
        PatternKind::RepeatedEmotion => format!(
            "The user has been feeling {} frequently ({} times recently). \
             Gently acknowledge this pattern with care, but also encourage positive changes. \
             Be gentle but honest - sometimes people need a loving nudge.",
            finding.emotion, finding.count
        ),
    }
}

/// Recap of the most recent emotions in chronological order
fn recap(history: &[HistoryEntry]) -> Option<String> {
    let mut recent: Vec<&str> = history
        .iter()
        .filter_map(|entry| entry.emotion)
        .take(RECAP_LEN)
        .map(Emotion::as_str)
        .collect();
    if recent.is_empty() {
        return None;
    }
    recent.reverse();
    Some(format!("User's recent emotions: {}", recent.join(", ")))
}
