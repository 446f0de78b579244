//! Recurring emotion detection over a bounded history window

use std::collections::HashMap;

use serde::Serialize;

use crate::emotion::Emotion;
use crate::ports::HistoryEntry;

/// Number of most recent turns considered for patterns and prompt context
pub const HISTORY_WINDOW: usize = 10;

/// Minimum occurrences before an emotion counts as a pattern
pub const REPEAT_THRESHOLD: usize = 3;

/// Kind of pattern found in the history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RepeatedEmotion,
}

/// A recurring pattern in the user's recent turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternFinding {
    pub kind: PatternKind,
    pub emotion: Emotion,
    pub count: usize,
}

/// Detect a repeated emotion in `history` (newest first)
///
/// Only the first [`HISTORY_WINDOW`] entries are tallied. Histories shorter
/// than [`REPEAT_THRESHOLD`] never produce findings.
#[must_use]
pub fn detect(history: &[HistoryEntry], current: Emotion) -> Vec<PatternFinding> {
    if history.len() < REPEAT_THRESHOLD {
        return Vec::new();
    }

    let mut tally: HashMap<Emotion, usize> = HashMap::new();
    for emotion in history
        .iter()
        .take(HISTORY_WINDOW)
        .filter_map(|entry| entry.emotion)
    {
        *tally.entry(emotion).or_default() += 1;
    }

    match tally.get(&current) {
        Some(&count) if count >= REPEAT_THRESHOLD => {
            tracing::debug!(emotion = %current, count, "repeated emotion detected");
            vec![PatternFinding {
                kind: PatternKind::RepeatedEmotion,
                emotion: current,
                count,
            }]
        }
        _ => Vec::new(),
    }
}
