use serde::{Deserialize, Serialize};

use crate::word::Word;

/// When a space is allowed to move the typist on to the next word.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum AdvancePolicy {
    /// The word must be typed exactly: cursor at the end, every character
    /// correct, no extras.
    #[default]
    Strict,
    /// Space always advances; untyped characters count as missed.
    Free,
}

impl AdvancePolicy {
    pub fn allows_advance(&self, word: &Word, cursor: usize) -> bool {
        match self {
            AdvancePolicy::Free => true,
            AdvancePolicy::Strict => {
                cursor == word.bounded_len() && word.is_fully_correct() && !word.has_extra()
            }
        }
    }
}
