use std::time::Instant;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::announce::Announcer;
use crate::assist::{AssistState, ErrorAssist, DEFAULT_HINT_THRESHOLD};
use crate::metrics::{self, LiveMetrics};
use crate::policy::AdvancePolicy;
use crate::result::{self, SessionResult, TestMode};
use crate::word::{build_words, CharStatus, Word};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no words to type")]
    EmptyContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionStatus {
    Ready,
    Running,
    Completed,
}

/// How a keypress was graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    /// Session over or no active word.
    Ignored,
    Correct,
    Incorrect,
    Extra,
}

/// What a space did.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Ignored,
    /// The advance policy refused to leave the word.
    Blocked,
    Advanced,
    Completed(SessionResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub mode: TestMode,
    /// Word target in words mode, seconds in time mode.
    pub mode_value: u32,
    pub policy: AdvancePolicy,
    pub hint_threshold: u32,
    pub language: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: TestMode::Words,
            mode_value: 25,
            policy: AdvancePolicy::Strict,
            hint_threshold: DEFAULT_HINT_THRESHOLD,
            language: "english".to_string(),
        }
    }
}

/// Gets told when a session starts and, exactly once, when it finishes.
pub trait SessionListener: Send {
    fn on_start(&self) {}
    fn on_complete(&self, _result: &SessionResult) {}
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub words: Vec<Word>,
    pub current_word_index: usize,
    pub current_char_index: usize,
    pub correct_chars: usize,
    pub incorrect_chars: usize,
    pub extra_chars: usize,
    /// Untyped characters in words that were skipped over.
    pub missed_chars: usize,
    pub start_time: Option<Instant>,
    pub is_complete: bool,
}

/// A wrong keystroke, kept for the mistake history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordError {
    pub expected: String,
    /// What had been typed of the word, including the wrong key.
    pub typed: String,
    pub position: usize,
    pub word_index: usize,
    /// The word was finished correctly afterwards.
    pub corrected: bool,
}

/// One per-second speed reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WpmSample {
    pub second: u64,
    /// Net wpm from the start up to this second.
    pub wpm: f64,
    /// Raw wpm over the interval since the previous sample.
    pub raw_wpm: f64,
}

/// One typing test: the words, the cursor, the counters and the hint.
pub struct Session {
    state: SessionState,
    options: SessionOptions,
    assist: ErrorAssist,
    listener: Option<Box<dyn SessionListener>>,
    input: String,
    samples: Vec<WpmSample>,
    sampled_chars: usize,
    word_errors: Vec<WordError>,
    result: Option<SessionResult>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("assist", &self.assist)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new<S: AsRef<str>>(
        content: &[S],
        options: SessionOptions,
        announcer: Box<dyn Announcer>,
    ) -> Result<Self, SessionError> {
        let words = build_words(content);
        if words.is_empty() {
            return Err(SessionError::EmptyContent);
        }

        debug!(
            "new {} session: {} words, {:?} policy",
            options.mode,
            words.len(),
            options.policy
        );

        Ok(Self {
            state: SessionState {
                words,
                ..SessionState::default()
            },
            assist: ErrorAssist::new(announcer, options.hint_threshold),
            options,
            listener: None,
            input: String::new(),
            samples: Vec::new(),
            sampled_chars: 0,
            word_errors: Vec::new(),
            result: None,
        })
    }

    pub fn with_listener(mut self, listener: Box<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn words(&self) -> &[Word] {
        &self.state.words
    }

    pub fn current_word(&self) -> Option<&Word> {
        self.state.words.get(self.state.current_word_index)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Keys typed so far for the active word.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn hint(&self) -> Option<&str> {
        self.assist.hint()
    }

    pub fn assist_state(&self) -> &AssistState {
        self.assist.state()
    }

    pub fn dismiss_hint(&mut self) {
        self.assist.hide();
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn samples(&self) -> &[WpmSample] {
        &self.samples
    }

    pub fn status(&self) -> SessionStatus {
        if self.state.is_complete {
            SessionStatus::Completed
        } else if self.state.start_time.is_some() {
            SessionStatus::Running
        } else {
            SessionStatus::Ready
        }
    }

    pub fn has_started(&self) -> bool {
        self.state.start_time.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete
    }

    /// Explicit start, e.g. when a timed test begins before the first key.
    pub fn start_at(&mut self, now: Instant) {
        if self.state.start_time.is_none() && !self.state.is_complete {
            self.state.start_time = Some(now);
            debug!("session started");
            if let Some(listener) = &self.listener {
                listener.on_start();
            }
        }
    }

    pub fn handle_key_press(&mut self, key: char) -> Keystroke {
        self.handle_key_press_at(key, Instant::now())
    }

    pub fn handle_key_press_at(&mut self, key: char, now: Instant) -> Keystroke {
        if self.state.is_complete {
            return Keystroke::Ignored;
        }
        let word_index = self.state.current_word_index;
        if word_index >= self.state.words.len() {
            return Keystroke::Ignored;
        }

        self.start_at(now);

        let idx = self.state.current_char_index;
        let word = &mut self.state.words[word_index];
        self.input.push(key);

        let outcome = if idx < word.bounded_len() {
            if word.characters()[idx].value == key {
                word.set_status(idx, CharStatus::Correct);
                self.state.correct_chars += 1;
                self.assist.on_correct(word, idx);
                Keystroke::Correct
            } else {
                word.set_status(idx, CharStatus::Incorrect);
                self.state.incorrect_chars += 1;
                self.word_errors.push(WordError {
                    expected: word.value().to_string(),
                    typed: self.input.clone(),
                    position: idx,
                    word_index,
                    corrected: false,
                });
                self.assist.on_incorrect(word);
                Keystroke::Incorrect
            }
        } else {
            word.push_extra(key);
            self.state.extra_chars += 1;
            Keystroke::Extra
        };

        self.state.current_char_index += 1;
        outcome
    }

    /// Returns false when there was nothing to erase.
    pub fn handle_backspace(&mut self) -> bool {
        if self.state.is_complete || self.state.current_char_index == 0 {
            return false;
        }
        let Some(word) = self.state.words.get_mut(self.state.current_word_index) else {
            return false;
        };

        let idx = self.state.current_char_index - 1;
        let Some(status) = word.characters().get(idx).map(|c| c.status) else {
            return false;
        };

        match status {
            CharStatus::Correct => {
                self.state.correct_chars = self.state.correct_chars.saturating_sub(1);
                word.set_status(idx, CharStatus::Pending);
            }
            CharStatus::Incorrect => {
                self.state.incorrect_chars = self.state.incorrect_chars.saturating_sub(1);
                word.set_status(idx, CharStatus::Pending);
            }
            CharStatus::Extra => {
                self.state.extra_chars = self.state.extra_chars.saturating_sub(1);
                word.pop_extra();
            }
            CharStatus::Pending => {}
        }

        self.state.current_char_index = idx;
        self.input.pop();
        true
    }

    pub fn handle_space(&mut self) -> Advance {
        self.handle_space_at(Instant::now())
    }

    pub fn handle_space_at(&mut self, now: Instant) -> Advance {
        if self.state.is_complete {
            return Advance::Ignored;
        }
        let word_index = self.state.current_word_index;
        let Some(word) = self.state.words.get_mut(word_index) else {
            return Advance::Ignored;
        };

        if !self
            .options
            .policy
            .allows_advance(word, self.state.current_char_index)
        {
            debug!("advance past {:?} blocked", word.value());
            return Advance::Blocked;
        }

        let word_done_right = word.is_fully_correct() && !word.has_extra();
        let skipped = word.characters()[..word.bounded_len()]
            .iter()
            .filter(|c| c.status == CharStatus::Pending)
            .count();
        self.state.missed_chars += skipped;

        word.set_active(false);
        word.set_completed(true);
        self.assist.on_advance(word);
        self.input.clear();

        if word_done_right {
            for error in self
                .word_errors
                .iter_mut()
                .filter(|e| e.word_index == word_index)
            {
                error.corrected = true;
            }
        }

        // Free policy lets a space on an untouched word start the clock.
        self.start_at(now);

        let next = word_index + 1;
        let target_reached =
            self.options.mode == TestMode::Words && next >= self.options.mode_value as usize;

        if target_reached || next >= self.state.words.len() {
            return match self.complete_at(now) {
                Some(result) => Advance::Completed(result),
                None => Advance::Advanced,
            };
        }

        self.state.words[next].set_active(true);
        self.state.current_word_index = next;
        self.state.current_char_index = 0;
        Advance::Advanced
    }

    pub fn complete(&mut self) -> Option<SessionResult> {
        self.complete_at(Instant::now())
    }

    /// Finishes the session and builds its result. Does nothing (and returns
    /// None) if the session already finished or never started.
    pub fn complete_at(&mut self, now: Instant) -> Option<SessionResult> {
        if self.state.is_complete {
            return None;
        }
        let start = self.state.start_time?;

        self.state.is_complete = true;
        self.assist.silence();

        let duration = now.saturating_duration_since(start).as_secs_f64();
        let raw: Vec<f64> = self.samples.iter().map(|s| s.raw_wpm).collect();

        let mut result = result::build(
            &self.state,
            self.options.mode,
            self.options.mode_value,
            duration,
            Utc::now(),
        );
        result.consistency = result::consistency(&raw);
        result.language = self.options.language.clone();

        info!(
            "session complete: {} wpm, {}% accuracy over {:.1}s",
            result.wpm, result.accuracy, result.duration
        );

        if let Some(listener) = &self.listener {
            listener.on_complete(&result);
        }
        self.result = Some(result.clone());
        Some(result)
    }

    /// Deadline entry point for timed tests. Loses quietly to a natural finish.
    pub fn force_complete(&mut self) -> Option<SessionResult> {
        self.force_complete_at(Instant::now())
    }

    pub fn force_complete_at(&mut self, now: Instant) -> Option<SessionResult> {
        if !self.state.is_complete {
            debug!("forcing completion");
        }
        self.complete_at(now)
    }

    /// Back to the starting line with the same words.
    pub fn reset(&mut self) {
        for (idx, word) in self.state.words.iter_mut().enumerate() {
            word.restore(idx == 0);
        }
        let words = std::mem::take(&mut self.state.words);
        self.state = SessionState {
            words,
            ..SessionState::default()
        };

        self.assist.on_reset();
        self.input.clear();
        self.samples.clear();
        self.sampled_chars = 0;
        self.word_errors.clear();
        self.result = None;
        debug!("session reset");
    }

    /// Records a speed sample for every whole second that has passed. Grading
    /// state is left alone.
    pub fn on_tick_at(&mut self, now: Instant) {
        if self.state.is_complete {
            return;
        }
        let Some(start) = self.state.start_time else {
            return;
        };

        let elapsed = now.saturating_duration_since(start);
        let second = elapsed.as_secs();
        let last = self.samples.last().map_or(0, |s| s.second);
        if second == 0 || second <= last {
            return;
        }

        let typed = self.total_chars();
        let interval = (second - last) as f64;
        self.samples.push(WpmSample {
            second,
            wpm: metrics::wpm(self.state.correct_chars, second as f64),
            raw_wpm: metrics::wpm(typed.saturating_sub(self.sampled_chars), interval),
        });
        self.sampled_chars = typed;
    }

    pub fn elapsed_secs_at(&self, now: Instant) -> f64 {
        if let Some(result) = &self.result {
            return result.duration;
        }
        self.state
            .start_time
            .map_or(0.0, |start| now.saturating_duration_since(start).as_secs_f64())
    }

    pub fn live_metrics(&self) -> LiveMetrics {
        self.live_metrics_at(Instant::now())
    }

    pub fn live_metrics_at(&self, now: Instant) -> LiveMetrics {
        LiveMetrics::compute(
            self.state.correct_chars,
            self.state.incorrect_chars,
            self.state.extra_chars,
            self.elapsed_secs_at(now),
        )
    }

    /// Hands over the recorded mistakes, leaving none behind.
    pub fn take_word_errors(&mut self) -> Vec<WordError> {
        std::mem::take(&mut self.word_errors)
    }

    fn total_chars(&self) -> usize {
        self.state.correct_chars + self.state.incorrect_chars + self.state.extra_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::{AnnounceCall, NullAnnouncer, RecordingAnnouncer};
    use assert_matches::assert_matches;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn session(words: &[&str]) -> Session {
        Session::new(words, SessionOptions::default(), Box::new(NullAnnouncer)).unwrap()
    }

    fn session_with(words: &[&str], options: SessionOptions) -> (Session, RecordingAnnouncer) {
        let announcer = RecordingAnnouncer::new();
        let session = Session::new(words, options, Box::new(announcer.clone())).unwrap();
        (session, announcer)
    }

    fn free() -> SessionOptions {
        SessionOptions {
            policy: AdvancePolicy::Free,
            ..SessionOptions::default()
        }
    }

    fn type_str(session: &mut Session, text: &str, now: Instant) {
        for c in text.chars() {
            session.handle_key_press_at(c, now);
        }
    }

    fn graded_count(session: &Session) -> usize {
        session
            .words()
            .iter()
            .flat_map(|w| w.characters()[..w.bounded_len()].iter())
            .filter(|c| matches!(c.status, CharStatus::Correct | CharStatus::Incorrect))
            .count()
    }

    #[derive(Clone, Default)]
    struct RecordingListener {
        starts: Arc<Mutex<usize>>,
        results: Arc<Mutex<Vec<SessionResult>>>,
    }

    impl SessionListener for RecordingListener {
        fn on_start(&self) {
            *self.starts.lock().unwrap() += 1;
        }

        fn on_complete(&self, result: &SessionResult) {
            self.results.lock().unwrap().push(result.clone());
        }
    }

    #[test]
    fn test_empty_content_rejected() {
        let empty: [&str; 0] = [];
        let err = Session::new(&empty, SessionOptions::default(), Box::new(NullAnnouncer));
        assert_matches!(err, Err(SessionError::EmptyContent));

        let blank = Session::new(&["  ", ""], SessionOptions::default(), Box::new(NullAnnouncer));
        assert_matches!(blank, Err(SessionError::EmptyContent));
    }

    #[test]
    fn test_first_key_starts_session() {
        let mut session = session(&["cat"]);
        assert_eq!(session.status(), SessionStatus::Ready);

        assert_eq!(session.handle_key_press('c'), Keystroke::Correct);
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.state().start_time.is_some());
    }

    #[test]
    fn test_grading_counts() {
        let mut session = session(&["cat"]);
        let now = Instant::now();

        assert_eq!(session.handle_key_press_at('c', now), Keystroke::Correct);
        assert_eq!(session.handle_key_press_at('x', now), Keystroke::Incorrect);
        assert_eq!(session.handle_key_press_at('t', now), Keystroke::Correct);
        assert_eq!(session.handle_key_press_at('s', now), Keystroke::Extra);

        let state = session.state();
        assert_eq!(state.correct_chars, 2);
        assert_eq!(state.incorrect_chars, 1);
        assert_eq!(state.extra_chars, 1);
        assert_eq!(state.current_char_index, 4);
        assert_eq!(session.words()[0].characters().len(), 4);
        assert_eq!(session.input(), "cxts");
        assert_eq!(graded_count(&session), 3);
    }

    #[test]
    fn test_backspace_at_zero_is_noop() {
        let mut session = session(&["cat"]);
        assert!(!session.handle_backspace());
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_backspace_inverts_keypress() {
        let mut session = session(&["cat"]);
        let now = Instant::now();
        session.handle_key_press_at('c', now);

        let before = session.words()[0].clone();
        session.handle_key_press_at('q', now);
        assert!(session.handle_backspace());

        assert_eq!(session.words()[0], before);
        assert_eq!(session.state().incorrect_chars, 0);
        assert_eq!(session.state().correct_chars, 1);
        assert_eq!(session.state().current_char_index, 1);
        assert_eq!(session.input(), "c");
    }

    #[test]
    fn test_extra_then_backspace_restores_length() {
        let mut session = session(&["cat", "dog"]);
        let now = Instant::now();
        type_str(&mut session, "cat", now);
        let extra_before = session.state().extra_chars;

        type_str(&mut session, "xyz", now);
        assert_eq!(session.state().extra_chars, extra_before + 3);
        assert_eq!(session.words()[0].characters().len(), 6);

        for _ in 0..3 {
            assert!(session.handle_backspace());
        }
        assert_eq!(session.state().extra_chars, extra_before);
        assert_eq!(session.words()[0].characters().len(), 3);
        assert_eq!(session.words()[0].count_status(CharStatus::Correct), 3);
    }

    #[test]
    fn test_backspace_stays_in_word() {
        let mut session = session(&["at", "be"]);
        let now = Instant::now();
        type_str(&mut session, "at", now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);

        assert!(!session.handle_backspace());
        assert_eq!(session.state().current_word_index, 1);
        assert!(session.words()[0].is_completed());
    }

    #[test]
    fn test_strict_scenario_cat_dog() {
        let (mut session, announcer) = session_with(&["cat", "dog"], SessionOptions::default());
        let now = Instant::now();

        type_str(&mut session, "cat", now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
        assert!(session.words()[0].is_completed());
        assert!(!session.words()[0].is_active());
        assert!(session.words()[1].is_active());
        assert_eq!(session.state().current_word_index, 1);
        assert_eq!(session.state().current_char_index, 0);

        type_str(&mut session, "dx", now);
        assert_eq!(session.handle_space_at(now), Advance::Blocked);
        assert_eq!(session.state().current_word_index, 1);
        assert_eq!(session.hint(), Some("dog"));
        assert_eq!(session.assist_state().consecutive_errors, 1);
        assert!(announcer
            .calls()
            .contains(&AnnounceCall::Announce("dog".into())));
    }

    #[test]
    fn test_fixing_word_retracts_hint_and_completes() {
        let mut session = session(&["cat", "dog"]);
        let now = Instant::now();
        type_str(&mut session, "cat", now);
        session.handle_space_at(now);

        type_str(&mut session, "dx", now);
        assert_eq!(session.hint(), Some("dog"));

        session.handle_backspace();
        type_str(&mut session, "og", now);
        assert_eq!(session.hint(), None);

        let later = now + Duration::from_secs(6);
        let result = assert_matches!(session.handle_space_at(later), Advance::Completed(r) => r);
        assert_eq!(result.character_stats.correct, 6);
        assert_eq!(result.character_stats.incorrect, 0);
        assert_eq!(result.characters_typed, 6);
        assert_eq!(result.duration, 6.0);
        assert_eq!(result.wpm, 12.0);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[test]
    fn test_strict_blocks_extras_and_short_words() {
        let mut session = session(&["cat", "dog"]);
        let now = Instant::now();
        type_str(&mut session, "ca", now);
        assert_eq!(session.handle_space_at(now), Advance::Blocked);

        type_str(&mut session, "ts", now);
        assert_eq!(session.handle_space_at(now), Advance::Blocked);

        session.handle_backspace();
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
    }

    #[test]
    fn test_blocked_space_does_not_start() {
        let mut session = session(&["cat"]);
        assert_eq!(session.handle_space(), Advance::Blocked);
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_free_policy_counts_missed() {
        let mut session = session_with(&["cat", "dog", "emu"], free()).0;
        let now = Instant::now();

        type_str(&mut session, "c", now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
        type_str(&mut session, "dxg", now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
        type_str(&mut session, "emu", now);

        let result = assert_matches!(
            session.handle_space_at(now + Duration::from_secs(3)),
            Advance::Completed(r) => r
        );
        assert_eq!(result.character_stats.missed, 2);
        assert_eq!(result.character_stats.incorrect, 1);
        assert_eq!(result.character_stats.correct, 6);
    }

    #[test]
    fn test_words_mode_target_completes_early() {
        let options = SessionOptions {
            mode_value: 2,
            ..SessionOptions::default()
        };
        let mut session = session_with(&["a", "b", "c", "d"], options).0;
        let now = Instant::now();

        session.handle_key_press_at('a', now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
        session.handle_key_press_at('b', now);
        assert_matches!(session.handle_space_at(now), Advance::Completed(_));
        assert!(session.is_complete());
    }

    #[test]
    fn test_time_mode_ignores_word_target() {
        let options = SessionOptions {
            mode: TestMode::Time,
            mode_value: 1,
            ..SessionOptions::default()
        };
        let mut session = session_with(&["a", "b"], options).0;
        let now = Instant::now();

        session.handle_key_press_at('a', now);
        assert_eq!(session.handle_space_at(now), Advance::Advanced);
    }

    #[test]
    fn test_complete_is_idempotent() {
        let listener = RecordingListener::default();
        let mut session = session(&["go"]).with_listener(Box::new(listener.clone()));
        let now = Instant::now();
        type_str(&mut session, "go", now);

        let first = assert_matches!(
            session.handle_space_at(now + Duration::from_secs(2)),
            Advance::Completed(r) => r
        );
        assert_eq!(session.complete_at(now + Duration::from_secs(9)), None);
        assert_eq!(session.force_complete_at(now + Duration::from_secs(9)), None);

        let stored = session.result().unwrap();
        assert_eq!(stored.timestamp, first.timestamp);
        assert_eq!(stored.duration, first.duration);
        assert_eq!(listener.results.lock().unwrap().len(), 1);
        assert_eq!(*listener.starts.lock().unwrap(), 1);
    }

    #[test]
    fn test_complete_requires_start() {
        let mut session = session(&["go"]);
        assert_eq!(session.complete(), None);
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_force_complete_mid_word() {
        let mut session = session(&["hello", "world"]);
        let now = Instant::now();
        type_str(&mut session, "hel", now);

        let result = session
            .force_complete_at(now + Duration::from_secs(30))
            .unwrap();
        assert_eq!(result.character_stats.correct, 3);
        assert_eq!(result.duration, 30.0);

        assert_eq!(session.handle_key_press_at('l', now), Keystroke::Ignored);
        assert!(!session.handle_backspace());
        assert_eq!(session.handle_space_at(now), Advance::Ignored);
    }

    #[test]
    fn test_completion_silences_speech() {
        let (mut session, announcer) = session_with(&["go"], SessionOptions::default());
        let now = Instant::now();
        session.handle_key_press_at('x', now);
        session.force_complete_at(now + Duration::from_secs(1));

        assert_eq!(announcer.calls().last(), Some(&AnnounceCall::Cancel));
    }

    #[test]
    fn test_reset_restores_everything() {
        let (mut session, announcer) = session_with(&["cat", "dog"], SessionOptions::default());
        let now = Instant::now();
        type_str(&mut session, "cat", now);
        session.handle_space_at(now);
        type_str(&mut session, "dxgzz", now);

        session.reset();

        let state = session.state();
        assert_eq!(state.current_word_index, 0);
        assert_eq!(state.current_char_index, 0);
        assert_eq!(state.correct_chars + state.incorrect_chars + state.extra_chars, 0);
        assert!(state.start_time.is_none());
        assert!(!state.is_complete);
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.hint(), None);
        assert_eq!(session.words()[1].characters().len(), 3);
        assert!(session.words()[0].is_active());
        assert!(!session.words()[1].is_active());
        assert!(session
            .words()
            .iter()
            .all(|w| w.count_status(CharStatus::Pending) == w.bounded_len()));
        assert_eq!(announcer.calls().last(), Some(&AnnounceCall::ClearAll));
        assert!(session.take_word_errors().is_empty());
    }

    #[test]
    fn test_counter_invariant_under_mixed_input() {
        let mut session = session(&["typing", "rust"]);
        let now = Instant::now();
        let script = "tpx\x08\x08\x08\x08yping!!\x08\x08";

        for c in script.chars() {
            if c == '\x08' {
                session.handle_backspace();
            } else {
                session.handle_key_press_at(c, now);
            }
            let state = session.state();
            assert_eq!(state.correct_chars + state.incorrect_chars, graded_count(&session));
            assert_eq!(state.extra_chars, session.words()[0].extra_count());
        }
    }

    #[test]
    fn test_word_errors_recorded_and_corrected() {
        let mut session = session(&["cat", "dog"]);
        let now = Instant::now();
        type_str(&mut session, "cx", now);
        session.handle_backspace();
        type_str(&mut session, "at", now);
        session.handle_space_at(now);
        type_str(&mut session, "z", now);

        let errors = session.take_word_errors();
        assert_eq!(
            errors,
            vec![
                WordError {
                    expected: "cat".into(),
                    typed: "cx".into(),
                    position: 1,
                    word_index: 0,
                    corrected: true,
                },
                WordError {
                    expected: "dog".into(),
                    typed: "z".into(),
                    position: 0,
                    word_index: 1,
                    corrected: false,
                },
            ]
        );
        assert!(session.take_word_errors().is_empty());
    }

    #[test]
    fn test_live_metrics() {
        let mut session = session(&["hello", "world"]);
        let start = Instant::now();
        assert_eq!(session.live_metrics_at(start).accuracy, 100.0);
        assert_eq!(session.live_metrics_at(start).wpm, 0.0);

        type_str(&mut session, "hellp", start);
        let live = session.live_metrics_at(start + Duration::from_secs(12));
        assert_eq!(live.correct_chars, 4);
        assert_eq!(live.total_chars, 5);
        assert_eq!(live.accuracy, 80.0);
        assert_eq!(live.wpm, 4.0);
        assert_eq!(live.raw_wpm, 5.0);
        assert_eq!(session.state().correct_chars, 4);
    }

    #[test]
    fn test_live_metrics_freeze_after_completion() {
        let mut session = session(&["hi"]);
        let start = Instant::now();
        type_str(&mut session, "hi", start);
        session.handle_space_at(start + Duration::from_secs(6));

        let later = session.live_metrics_at(start + Duration::from_secs(60));
        assert_eq!(later.elapsed_secs, 6.0);
        assert_eq!(later.wpm, 4.0);
    }

    #[test]
    fn test_tick_samples_feed_consistency() {
        let mut session = session(&["aaaaa", "bbbbb", "ccccc"]);
        let start = Instant::now();
        session.on_tick_at(start);
        assert!(session.samples().is_empty());

        type_str(&mut session, "aaaaa", start);
        session.handle_space_at(start);
        session.on_tick_at(start + Duration::from_millis(1000));
        session.on_tick_at(start + Duration::from_millis(1050));

        type_str(&mut session, "bbbbb", start + Duration::from_millis(1500));
        session.handle_space_at(start + Duration::from_millis(1500));
        session.on_tick_at(start + Duration::from_millis(2000));

        assert_eq!(session.samples().len(), 2);
        assert_eq!(session.samples()[0].raw_wpm, 60.0);
        assert_eq!(session.samples()[1].raw_wpm, 60.0);
        assert_eq!(session.state().correct_chars, 10);

        type_str(&mut session, "ccccc", start + Duration::from_millis(2500));
        let result = assert_matches!(
            session.handle_space_at(start + Duration::from_secs(3)),
            Advance::Completed(r) => r
        );
        assert_eq!(result.consistency, 100.0);
    }

    #[test]
    fn test_language_carried_into_result() {
        let options = SessionOptions {
            language: "english_1k".into(),
            ..SessionOptions::default()
        };
        let mut session = session_with(&["a"], options).0;
        let now = Instant::now();
        session.handle_key_press_at('a', now);
        let result = session.force_complete_at(now + Duration::from_secs(1)).unwrap();
        assert_eq!(result.language, "english_1k");
        assert_eq!(result.mode, TestMode::Words);
        assert_eq!(result.mode_value, 25);
    }
}
