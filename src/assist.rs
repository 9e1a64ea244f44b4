use log::debug;

use crate::announce::Announcer;
use crate::word::Word;

/// Errors on the current word before the correction hint appears.
pub const DEFAULT_HINT_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistState {
    pub consecutive_errors: u32,
    pub last_tracked_word: String,
    pub hint_visible: bool,
    pub hint_word: String,
}

/// Shows the correct word (and reads it aloud) once the typist trips over
/// it, and takes the hint back once the word has been fixed.
pub struct ErrorAssist {
    state: AssistState,
    threshold: u32,
    announcer: Box<dyn Announcer>,
}

impl std::fmt::Debug for ErrorAssist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorAssist")
            .field("state", &self.state)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl ErrorAssist {
    pub fn new(announcer: Box<dyn Announcer>, threshold: u32) -> Self {
        Self {
            state: AssistState::default(),
            threshold,
            announcer,
        }
    }

    pub fn state(&self) -> &AssistState {
        &self.state
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn hint(&self) -> Option<&str> {
        self.state
            .hint_visible
            .then_some(self.state.hint_word.as_str())
    }

    pub fn on_incorrect(&mut self, word: &Word) {
        if self.state.last_tracked_word != word.value() {
            self.state.consecutive_errors = 1;
            self.state.last_tracked_word = word.value().to_string();
        } else {
            self.state.consecutive_errors += 1;
        }

        if self.state.consecutive_errors >= self.threshold {
            debug!(
                "hint for {:?} after {} error(s)",
                word.value(),
                self.state.consecutive_errors
            );
            self.state.hint_visible = true;
            self.state.hint_word = word.value().to_string();
            self.announcer.announce_correct_word(word.value());
        }
    }

    /// `graded` is the index of the character that was just marked correct.
    pub fn on_correct(&mut self, word: &Word, graded: usize) {
        if !self.state.hint_visible {
            return;
        }

        let last = word.bounded_len().saturating_sub(1);
        if graded == last && word.is_fully_correct() {
            debug!("{:?} corrected, retracting hint", word.value());
            self.announcer.cancel();
            self.announcer.clear_word_tracking(word.value());
            self.clear();
        }
    }

    pub fn on_advance(&mut self, word: &Word) {
        self.announcer.cancel();
        self.announcer.clear_word_tracking(word.value());
        self.clear();
    }

    pub fn on_reset(&mut self) {
        self.announcer.cancel();
        self.announcer.clear_all_tracking();
        self.clear();
    }

    /// Stops any speech without touching the counters.
    pub fn silence(&mut self) {
        self.announcer.cancel();
    }

    /// Dismisses the hint, e.g. when the typist closes it.
    pub fn hide(&mut self) {
        self.state.hint_visible = false;
    }

    fn clear(&mut self) {
        self.state = AssistState::default();
    }
}
