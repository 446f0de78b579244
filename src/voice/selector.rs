//! Emotion- and language-aware voice selection

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;

/// Phrases that mark a reply as calling out a pattern
pub const DEFAULT_SCOLD_KEYWORDS: &[&str] = &[
    "repeated",
    "again",
    "pattern",
    "notice",
    "tendency",
    "keep doing",
];

// ElevenLabs stock voices: a soft female voice and a steady male voice
const SOFT_VOICE: &str = "EXAVITQu4vr4xnSDxMaL";
const STEADY_VOICE: &str = "pNInz6obpgDQGcFmaJgB";

/// Identifiers that are clearly unconfigured templates rather than voices
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^(
            your[-_\s].* | .*[-_]here | <.*> | \$\{.*\} | \{\{.*\}\} | \[.*\]
            | change[-_]?me | replace[-_]?me | todo | tbd | fixme
            | placeholder.* | example.* | sample[-_]?voice.*
            | voice[-_]?id | none | null | nil | undefined
            | x{3,} | 0+ | \.{3,} | -+
        )$",
    )
    .expect("valid regex")
});

/// Whether a voice identifier is a known placeholder or blank
#[must_use]
pub fn is_placeholder(voice_id: &str) -> bool {
    let trimmed = voice_id.trim();
    trimmed.is_empty() || PLACEHOLDER.is_match(trimmed)
}

/// Language tier a selection was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    English,
    Hindi,
}

impl Tier {
    /// Tier for a normalised language tag and whether it was a fallback
    #[must_use]
    pub fn for_language(language: &str) -> (Self, bool) {
        match language {
            "en" => (Self::English, false),
            "hi" => (Self::Hindi, false),
            _ => (Self::English, true),
        }
    }
}

/// Emotion → voice mapping for one language
///
/// Only `neutral` is required; missing emotions fall back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTier {
    pub neutral: String,
    #[serde(default)]
    pub happy: Option<String>,
    #[serde(default)]
    pub positive: Option<String>,
    #[serde(default)]
    pub sad: Option<String>,
    #[serde(default)]
    pub angry: Option<String>,
}

impl VoiceTier {
    /// Tier with the same voice for every emotion
    #[must_use]
    pub fn uniform(voice_id: impl Into<String>) -> Self {
        Self {
            neutral: voice_id.into(),
            happy: None,
            positive: None,
            sad: None,
            angry: None,
        }
    }

    /// Voice mapped to `emotion`, or the neutral voice when unmapped
    #[must_use]
    pub fn voice_for(&self, emotion: Emotion) -> &str {
        let mapped = match emotion {
            Emotion::Happy => self.happy.as_deref(),
            Emotion::Positive => self.positive.as_deref(),
            Emotion::Neutral => Some(self.neutral.as_str()),
            Emotion::Sad => self.sad.as_deref(),
            Emotion::Angry => self.angry.as_deref(),
        };
        mapped.unwrap_or(&self.neutral)
    }

    /// The tier's calm voice used for pattern call-outs
    #[must_use]
    pub fn neutral(&self) -> &str {
        &self.neutral
    }
}

/// Voice configuration for the selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub english: VoiceTier,
    pub hindi: VoiceTier,
    #[serde(default = "default_scold_keywords")]
    pub scold_keywords: Vec<String>,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        // The multilingual model speaks Hindi with the same stock voices
        let tier = VoiceTier {
            neutral: STEADY_VOICE.to_string(),
            happy: Some(SOFT_VOICE.to_string()),
            positive: Some(SOFT_VOICE.to_string()),
            sad: Some(SOFT_VOICE.to_string()),
            angry: Some(STEADY_VOICE.to_string()),
        };
        Self {
            english: tier.clone(),
            hindi: tier,
            scold_keywords: default_scold_keywords(),
        }
    }
}

fn default_scold_keywords() -> Vec<String> {
    DEFAULT_SCOLD_KEYWORDS.iter().map(ToString::to_string).collect()
}

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceChoice {
    /// Voice to synthesize with; `None` means skip synthesis
    pub voice_id: Option<String>,
    pub tier: Tier,
    /// The language had no tier and English was used instead
    pub language_fallback: bool,
    /// The scolding override replaced the emotion-mapped voice
    pub scolding: bool,
}

/// Picks an output voice for a reply
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    profile: VoiceProfile,
    scold_keywords: Vec<String>,
}

impl Default for VoiceSelector {
    fn default() -> Self {
        Self::new(VoiceProfile::default())
    }
}

impl VoiceSelector {
    /// Create a selector from a voice profile
    #[must_use]
    pub fn new(profile: VoiceProfile) -> Self {
        let scold_keywords = profile
            .scold_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            profile,
            scold_keywords,
        }
    }

    /// Whether a reply reads as a pattern call-out
    #[must_use]
    pub fn is_scolding(&self, reply: &str) -> bool {
        let lowered = reply.to_lowercase();
        self.scold_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Select a voice for `reply` spoken to a user feeling `emotion`
    ///
    /// `language` is a normalised tag; languages without a tier use English.
    #[must_use]
    pub fn select(&self, emotion: Emotion, language: &str, reply: &str) -> VoiceChoice {
        let (tier, language_fallback) = Tier::for_language(language);
        if language_fallback {
            tracing::warn!(language, "no voice tier for language, using English");
        }

        let voices = match tier {
            Tier::English => &self.profile.english,
            Tier::Hindi => &self.profile.hindi,
        };

        let scolding = emotion.is_distressed() && self.is_scolding(reply);
        let candidate = if scolding {
            tracing::debug!(%emotion, "pattern call-out, using calm voice");
            voices.neutral()
        } else {
            voices.voice_for(emotion)
        };

        let voice_id = if is_placeholder(candidate) {
            tracing::warn!(
                voice = candidate,
                ?tier,
                %emotion,
                "voice id is unconfigured, skipping synthesis"
            );
            None
        } else {
            Some(candidate.trim().to_string())
        };

        VoiceChoice {
            voice_id,
            tier,
            language_fallback,
            scolding,
        }
    }
}
