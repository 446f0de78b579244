//! Affect classification for transcribed utterances
//!
//! A [`SentimentScorer`] reduces text to polarity scores; the classifier then
//! maps the compound score onto one of five [`Emotion`] labels:
//!
//! | compound          | label    |
//! |-------------------|----------|
//! | `c >= 0.5`        | happy    |
//! | `0.1 <= c < 0.5`  | positive |
//! | `-0.1 < c < 0.1`  | neutral  |
//! | `-0.5 <= c <= -0.1` | sad    |
//! | `c < -0.5`        | angry    |

mod vader;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use vader::VaderScorer;

use crate::Result;

/// Discrete emotion label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Positive,
    Neutral,
    Sad,
    Angry,
}

impl Emotion {
    /// Every label, in descending valence order
    pub const ALL: [Self; 5] = [
        Self::Happy,
        Self::Positive,
        Self::Neutral,
        Self::Sad,
        Self::Angry,
    ];

    /// Map a compound score onto a label
    ///
    /// Non-finite scores are treated as neutral.
    #[must_use]
    pub fn from_compound(compound: f64) -> Self {
        if !compound.is_finite() {
            return Self::Neutral;
        }
        if compound >= 0.5 {
            Self::Happy
        } else if compound >= 0.1 {
            Self::Positive
        } else if compound > -0.1 {
            Self::Neutral
        } else if compound >= -0.5 {
            Self::Sad
        } else {
            Self::Angry
        }
    }

    /// Lowercase label as stored and sent over the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Angry => "angry",
        }
    }

    /// Parse a stored label (case-insensitive)
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "happy" => Some(Self::Happy),
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "sad" => Some(Self::Sad),
            "angry" => Some(Self::Angry),
            _ => None,
        }
    }

    /// Whether a pattern call-out should be voiced calmly for this label
    #[must_use]
    pub const fn is_distressed(self) -> bool {
        matches!(self, Self::Sad | Self::Angry)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified affect of one utterance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub label: Emotion,
    /// Compound score rounded to two decimals, in `[-1, 1]`
    pub valence: f64,
    /// `|pos - neg|` rounded to two decimals, in `[0, 1]`
    pub confidence: f64,
}

impl Default for EmotionResult {
    fn default() -> Self {
        Self {
            label: Emotion::Neutral,
            valence: 0.0,
            confidence: 0.0,
        }
    }
}

/// Proportional polarity scores produced by a scorer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolarityScores {
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
    pub compound: f64,
}

/// Reduces text to polarity scores
pub trait SentimentScorer: Send + Sync {
    /// Score a non-empty piece of text
    ///
    /// # Errors
    ///
    /// Returns error if the scorer cannot produce scores
    fn polarity_scores(&self, text: &str) -> Result<PolarityScores>;
}

/// Maps utterance text to an [`EmotionResult`]
#[derive(Clone)]
pub struct EmotionClassifier {
    scorer: Arc<dyn SentimentScorer>,
}

impl Default for EmotionClassifier {
    fn default() -> Self {
        Self::new(Arc::new(VaderScorer::new()))
    }
}

impl fmt::Debug for EmotionClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmotionClassifier").finish_non_exhaustive()
    }
}

impl EmotionClassifier {
    /// Create a classifier backed by the given scorer
    #[must_use]
    pub fn new(scorer: Arc<dyn SentimentScorer>) -> Self {
        Self { scorer }
    }

    /// Classify an utterance
    ///
    /// Blank text and scorer failures both yield the neutral default.
    #[must_use]
    pub fn classify(&self, text: &str) -> EmotionResult {
        if text.trim().is_empty() {
            return EmotionResult::default();
        }

        let scores = match self.scorer.polarity_scores(text) {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "sentiment scoring failed, using neutral");
                return EmotionResult::default();
            }
        };

        if !scores.compound.is_finite() {
            tracing::warn!(compound = scores.compound, "non-finite compound score, using neutral");
            return EmotionResult::default();
        }

        let compound = scores.compound.clamp(-1.0, 1.0);
        let confidence = if scores.pos.is_finite() && scores.neg.is_finite() {
            (scores.pos - scores.neg).abs().min(1.0)
        } else {
            0.0
        };

        EmotionResult {
            label: Emotion::from_compound(compound),
            valence: round2(compound),
            confidence: round2(confidence),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
