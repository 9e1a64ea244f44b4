use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics;
use crate::session::SessionState;
use crate::util::coefficient_of_variation;

/// How a test decides it is over.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestMode {
    /// Ends when the countdown runs out.
    Time,
    /// Ends after a fixed number of words.
    #[default]
    Words,
    /// Ends after the last word of the passage.
    Quote,
}

impl TestMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(TestMode::Time),
            "words" => Some(TestMode::Words),
            "quote" => Some(TestMode::Quote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub correct: usize,
    pub incorrect: usize,
    pub extra: usize,
    pub missed: usize,
}

/// Final record of a completed session. Built once; never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub id: String,
    pub wpm: f64,
    pub raw_wpm: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub mode: TestMode,
    pub mode_value: u32,
    /// Seconds between the first keystroke and completion.
    pub duration: f64,
    pub characters_typed: usize,
    pub character_stats: CharacterStats,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub language: String,
}

impl SessionResult {
    pub fn is_perfect(&self) -> bool {
        self.character_stats.incorrect == 0
            && self.character_stats.extra == 0
            && self.character_stats.missed == 0
            && self.characters_typed > 0
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Assembles the result for a finished session. Consistency starts at 0 and
/// the language as "english"; the engine fills both in from what it tracked.
pub fn build(
    state: &SessionState,
    mode: TestMode,
    mode_value: u32,
    duration_secs: f64,
    finished_at: DateTime<Utc>,
) -> SessionResult {
    let correct = state.correct_chars;
    let incorrect = state.incorrect_chars;
    let extra = state.extra_chars;
    let typed = correct + incorrect + extra;

    SessionResult {
        id: format!("test-{}", finished_at.timestamp_millis()),
        wpm: metrics::wpm(correct, duration_secs),
        raw_wpm: metrics::raw_wpm(correct, incorrect, extra, duration_secs),
        accuracy: metrics::accuracy(correct, typed),
        consistency: 0.0,
        mode,
        mode_value,
        duration: duration_secs,
        characters_typed: typed,
        character_stats: CharacterStats {
            correct,
            incorrect,
            extra,
            missed: state.missed_chars,
        },
        timestamp: finished_at.timestamp_millis(),
        language: "english".to_string(),
    }
}

/// Steadiness of per-second speed, 0..=100. Needs at least two samples.
pub fn consistency(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    match coefficient_of_variation(samples) {
        Some(cv) => {
            let score = (100.0 - cv * 100.0).clamp(0.0, 100.0);
            (score * 100.0).round() / 100.0
        }
        None => 0.0,
    }
}
