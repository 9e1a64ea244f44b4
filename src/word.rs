use serde::{Deserialize, Serialize};

/// Grading state of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum CharStatus {
    Pending,
    Correct,
    Incorrect,
    /// Typed past the end of the word; never graded.
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub value: char,
    pub status: CharStatus,
}

impl Character {
    fn pending(value: char) -> Self {
        Self {
            value,
            status: CharStatus::Pending,
        }
    }
}

/// One word of the test content.
///
/// `characters[..bounded_len()]` mirror `value` one to one; anything beyond
/// that is `Extra` overflow. Fields are read-only outside the crate so every
/// mutation goes through the session engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    id: String,
    value: String,
    characters: Vec<Character>,
    is_active: bool,
    is_completed: bool,
}

impl Word {
    pub(crate) fn new(index: usize, value: &str) -> Self {
        Self {
            id: format!("word-{index}"),
            value: value.to_string(),
            characters: value.chars().map(Character::pending).collect(),
            is_active: index == 0,
            is_completed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Length of the word's own text, in characters.
    pub fn bounded_len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn extra_count(&self) -> usize {
        self.characters.len() - self.bounded_len()
    }

    pub fn has_extra(&self) -> bool {
        self.characters.len() > self.bounded_len()
    }

    /// Every character of the bounded region is `Correct`.
    pub fn is_fully_correct(&self) -> bool {
        self.characters[..self.bounded_len()]
            .iter()
            .all(|c| c.status == CharStatus::Correct)
    }

    pub fn count_status(&self, status: CharStatus) -> usize {
        self.characters
            .iter()
            .filter(|c| c.status == status)
            .count()
    }

    pub(crate) fn set_status(&mut self, idx: usize, status: CharStatus) {
        if let Some(c) = self.characters.get_mut(idx) {
            c.status = status;
        }
    }

    pub(crate) fn push_extra(&mut self, value: char) {
        self.characters.push(Character {
            value,
            status: CharStatus::Extra,
        });
    }

    /// Removes the last character if it is `Extra`.
    pub(crate) fn pop_extra(&mut self) -> Option<Character> {
        match self.characters.last() {
            Some(c) if c.status == CharStatus::Extra => self.characters.pop(),
            _ => None,
        }
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.is_completed = completed;
    }

    /// Back to all-`Pending` at the original length.
    pub(crate) fn restore(&mut self, active: bool) {
        self.characters = self.value.chars().map(Character::pending).collect();
        self.is_active = active;
        self.is_completed = false;
    }
}

/// Builds the word sequence for a test, splitting any entry that contains
/// whitespace and dropping empty tokens.
pub fn build_words<S: AsRef<str>>(content: &[S]) -> Vec<Word> {
    content
        .iter()
        .flat_map(|s| s.as_ref().split_whitespace())
        .enumerate()
        .map(|(idx, token)| Word::new(idx, token))
        .collect()
}
