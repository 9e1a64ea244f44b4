//! Spoken read-back of the correct word after a typing error.
//!
//! An announcement is a short sequence of utterances and pauses
//! ("The correct word is dog", "Spell", "d", "o", "g") run on a worker
//! thread. Only one sequence is ever in flight: starting a new one cancels
//! the previous one first, and the cancel token is checked before every
//! utterance and throughout every pause.

use std::collections::{HashMap, HashSet};
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

const PAUSE_SLICE: Duration = Duration::from_millis(5);

/// Capability the engine uses to read words aloud. Every call returns
/// immediately; failures never reach the caller.
pub trait Announcer: Send {
    fn announce_correct_word(&self, word: &str);
    fn cancel(&self);
    fn clear_word_tracking(&self, word: &str);
    fn clear_all_tracking(&self);
}

/// Speech disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn announce_correct_word(&self, _word: &str) {}
    fn cancel(&self) {}
    fn clear_word_tracking(&self, _word: &str) {}
    fn clear_all_tracking(&self) {}
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech command exited with {0}")]
    Command(std::process::ExitStatus),
    #[error("speech io error: {0}")]
    Io(#[from] io::Error),
}

/// Something that can turn text into sound. `speak` blocks until the
/// utterance is finished or `token` is cancelled, and leaves nothing
/// playing behind when it returns.
pub trait SpeechSink: Send + Sync + 'static {
    fn speak(&self, text: &str, rate: f32, token: &CancelToken) -> Result<(), SpeechError>;
}

/// Writes utterances to the log instead of speaking them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SpeechSink for LogSink {
    fn speak(&self, text: &str, rate: f32, _token: &CancelToken) -> Result<(), SpeechError> {
        log::info!("speak (rate {rate:.1}): {text}");
        Ok(())
    }
}

/// Speaks through an external synthesizer such as `espeak`. Each utterance
/// owns its child process and kills it when its token is cancelled.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    base_words_per_min: f32,
}

impl CommandSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_words_per_min: 175.0,
        }
    }
}

fn reap(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl SpeechSink for CommandSink {
    fn speak(&self, text: &str, rate: f32, token: &CancelToken) -> Result<(), SpeechError> {
        let speed = (self.base_words_per_min * rate).round() as u32;
        let mut child = Command::new(&self.program)
            .arg("-s")
            .arg(speed.to_string())
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        loop {
            if token.is_cancelled() {
                reap(child);
                return Ok(());
            }
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(SpeechError::Command(status)),
                Ok(None) => thread::sleep(PAUSE_SLICE),
                Err(e) => {
                    reap(child);
                    return Err(e.into());
                }
            }
        }
    }
}

/// Shared flag telling an announcement sequence to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first. Returns false when cancelled.
    pub fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }
}

/// Pauses between the steps of an announcement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnounceTiming {
    pub after_word: Duration,
    pub after_intro: Duration,
    pub between_letters: Duration,
    pub word_rate: f32,
    pub letter_rate: f32,
}

impl Default for AnnounceTiming {
    fn default() -> Self {
        Self {
            after_word: Duration::from_millis(100),
            after_intro: Duration::from_millis(50),
            between_letters: Duration::from_millis(50),
            word_rate: 1.3,
            letter_rate: 1.5,
        }
    }
}

type SpokenLetters = Arc<Mutex<HashMap<String, HashSet<char>>>>;

struct InFlight {
    token: CancelToken,
    handle: JoinHandle<()>,
}

/// Runs announcement sequences against a [`SpeechSink`].
pub struct SpeechAnnouncer<S: SpeechSink> {
    sink: Arc<S>,
    timing: AnnounceTiming,
    spoken: SpokenLetters,
    in_flight: Mutex<Option<InFlight>>,
}

impl<S: SpeechSink> SpeechAnnouncer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_timing(sink, AnnounceTiming::default())
    }

    pub fn with_timing(sink: S, timing: AnnounceTiming) -> Self {
        Self {
            sink: Arc::new(sink),
            timing,
            spoken: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Mutex::new(None),
        }
    }

    /// Letters already spelled out for `word`.
    pub fn spoken_letters(&self, word: &str) -> HashSet<char> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(word)
            .cloned()
            .unwrap_or_default()
    }

    /// Blocks until the current announcement (if any) has finished.
    pub fn wait(&self) {
        let current = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(InFlight { handle, .. }) = current {
            let _ = handle.join();
        }
    }

    /// Cancels the running sequence and hands back its worker, which exits
    /// within one pause slice.
    fn cancel_in_flight(&self) -> Option<JoinHandle<()>> {
        let mut guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        guard.take().map(|InFlight { token, handle }| {
            token.cancel();
            handle
        })
    }
}

fn run_announcement<S: SpeechSink>(
    sink: &S,
    spoken: &SpokenLetters,
    timing: AnnounceTiming,
    token: &CancelToken,
    word: &str,
) {
    let say = |text: &str, rate: f32| -> bool {
        if token.is_cancelled() {
            return false;
        }
        if let Err(e) = sink.speak(text, rate, token) {
            warn!("speech failed for {text:?}: {e}");
        }
        !token.is_cancelled()
    };

    if !say(&format!("The correct word is {word}"), timing.word_rate) {
        return;
    }
    if !token.pause(timing.after_word) {
        return;
    }
    if !say("Spell", timing.word_rate) {
        return;
    }
    if !token.pause(timing.after_intro) {
        return;
    }

    let letters: Vec<char> = word.chars().collect();
    for (idx, letter) in letters.iter().enumerate() {
        let already = spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(word)
            .is_some_and(|set| set.contains(letter));
        if already {
            continue;
        }

        if !say(&letter.to_string(), timing.letter_rate) {
            return;
        }
        spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(word.to_string())
            .or_default()
            .insert(*letter);

        if idx + 1 < letters.len() && !token.pause(timing.between_letters) {
            return;
        }
    }
}

impl<S: SpeechSink> Announcer for SpeechAnnouncer<S> {
    fn announce_correct_word(&self, word: &str) {
        let previous = self.cancel_in_flight();

        let token = CancelToken::new();
        let sink = Arc::clone(&self.sink);
        let spoken = Arc::clone(&self.spoken);
        let timing = self.timing;
        let word = word.to_string();
        let thread_token = token.clone();

        debug!("announcing {word:?}");
        let handle = thread::spawn(move || {
            // the cancelled sequence must be silent before this one speaks
            if let Some(previous) = previous {
                let _ = previous.join();
            }
            run_announcement(sink.as_ref(), &spoken, timing, &thread_token, &word);
        });

        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(InFlight { token, handle });
    }

    fn cancel(&self) {
        let _ = self.cancel_in_flight();
    }

    fn clear_word_tracking(&self, word: &str) {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(word);
    }

    fn clear_all_tracking(&self) {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl<S: SpeechSink> Drop for SpeechAnnouncer<S> {
    fn drop(&mut self) {
        let _ = self.cancel_in_flight();
    }
}

/// A call observed by [`RecordingAnnouncer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceCall {
    Announce(String),
    Cancel,
    ClearWord(String),
    ClearAll,
}

/// Test announcer that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnnouncer {
    calls: Arc<Mutex<Vec<AnnounceCall>>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AnnounceCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, call: AnnounceCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce_correct_word(&self, word: &str) {
        self.push(AnnounceCall::Announce(word.to_string()));
    }

    fn cancel(&self) {
        self.push(AnnounceCall::Cancel);
    }

    fn clear_word_tracking(&self, word: &str) {
        self.push(AnnounceCall::ClearWord(word.to_string()));
    }

    fn clear_all_tracking(&self) {
        self.push(AnnounceCall::ClearAll);
    }
}
