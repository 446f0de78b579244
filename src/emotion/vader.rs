//! VADER sentiment scorer
//!
//! Backed by the `vader_sentiment` crate, which ships the full VADER lexicon
//! (~7,500 entries plus emoji descriptions) and its rules: boosters,
//! negation, ALL-CAPS emphasis, "but" contrast and punctuation emphasis.

use std::fmt;

use vader_sentiment::SentimentIntensityAnalyzer;

use super::{PolarityScores, SentimentScorer};
use crate::{Error, Result};

/// [`SentimentScorer`] over the VADER lexicon
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VaderScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaderScorer").finish_non_exhaustive()
    }
}

impl VaderScorer {
    /// Create a scorer over the bundled lexicon
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl SentimentScorer for VaderScorer {
    fn polarity_scores(&self, text: &str) -> Result<PolarityScores> {
        let scores = self.analyzer.polarity_scores(text);
        let get = |key: &str| {
            scores
                .get(key)
                .copied()
                .ok_or_else(|| Error::Sentiment(format!("analyzer returned no '{key}' score")))
        };

        Ok(PolarityScores {
            pos: get("pos")?,
            neg: get("neg")?,
            neu: get("neu")?,
            compound: get("compound")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compound(text: &str) -> f64 {
        VaderScorer::new().polarity_scores(text).unwrap().compound
    }

    #[test]
    fn neutral_text_scores_zero() {
        let scores = VaderScorer::new()
            .polarity_scores("The train leaves at noon")
            .unwrap();
        assert!(scores.compound.abs() < f64::EPSILON);
        assert!((scores.neu - 1.0).abs() < 1e-9);
    }

    #[test]
    fn everyday_emotional_words_are_scored() {
        for text in [
            "I am devastated and heartbroken",
            "This sucks",
            "Everything is a disaster",
            "I'm really pissed off at him",
        ] {
            assert!(compound(text) <= -0.1, "{text:?} scored {}", compound(text));
        }
        assert!(compound("I'm ecstatic, I got the job") >= 0.1);
    }

    #[test]
    fn booster_increases_intensity() {
        assert!(compound("I am very happy") > compound("I am happy"));
    }

    #[test]
    fn negation_flips_polarity() {
        assert!(compound("I am happy") > 0.0);
        assert!(compound("I am not happy") < 0.0);
    }

    #[test]
    fn caps_emphasis_in_mixed_case() {
        assert!(compound("I am HAPPY today") > compound("I am happy today"));
    }

    #[test]
    fn exclamation_adds_emphasis() {
        assert!(compound("This is great!!!") > compound("This is great"));
    }

    #[test]
    fn but_shifts_weight_to_second_clause() {
        assert!(compound("The food was good but the service was terrible") < 0.0);
    }

    #[test]
    fn proportions_sum_to_one() {
        let scores = VaderScorer::new()
            .polarity_scores("I love it but I am tired")
            .unwrap();
        let total = scores.pos + scores.neg + scores.neu;
        assert!((total - 1.0).abs() < 0.01);
    }
}
