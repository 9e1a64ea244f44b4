use cgisf_lib::cgisf;
use include_dir::{include_dir, Dir};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use thiserror::Error;

static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

const PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];
const PUNCTUATION_CHANCE: f64 = 0.1;
const NUMBER_CHANCE: f64 = 0.1;
const MAX_SENTENCES: usize = 200;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("word list {0:?} not found")]
    NotFound(String),
    #[error("word list {name:?} is unreadable: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("sentence generation failed: {0}")]
    Generation(String),
    #[error("no words available")]
    Empty,
}

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
pub enum Complexity {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Which generator feeds a test.
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
pub enum SourceKind {
    #[default]
    Wordlist,
    Sentence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRequest {
    pub count: usize,
    pub complexity: Complexity,
    pub punctuation: bool,
    pub numbers: bool,
}

impl WordRequest {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            complexity: Complexity::default(),
            punctuation: false,
            numbers: false,
        }
    }
}

/// Supplies the text of a test.
pub trait WordSource {
    fn name(&self) -> &str;
    fn words(&self, request: &WordRequest) -> Result<Vec<String>, SourceError>;
}

#[derive(Deserialize, Clone, Debug)]
pub struct WordList {
    pub name: String,
    pub size: u32,
    pub words: Vec<String>,
}

impl WordList {
    pub fn embedded(name: &str) -> Result<Self, SourceError> {
        let file = LANG_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;
        let text = file
            .contents_utf8()
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;

        from_str(text).map_err(|source| SourceError::Parse {
            name: name.to_string(),
            source,
        })
    }
}

/// Random picks from a word list, optionally sprinkled with punctuation
/// and numbers.
#[derive(Debug, Clone)]
pub struct WordlistSource {
    list: WordList,
}

impl WordlistSource {
    pub const DEFAULT_LIST: &'static str = "english_1k";

    pub fn new(list: WordList) -> Self {
        Self { list }
    }

    pub fn embedded(name: &str) -> Result<Self, SourceError> {
        WordList::embedded(name).map(Self::new)
    }

    pub fn generate<R: Rng>(&self, request: &WordRequest, rng: &mut R) -> Vec<String> {
        let pool = complexity_pool(&self.list.words, request.complexity);

        let mut words = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let Some(picked) = pool.choose(rng) else {
                break;
            };
            let mut word = picked.to_string();
            if request.numbers && rng.gen_bool(NUMBER_CHANCE) {
                word = rng.gen_range(0..1000u32).to_string();
            }
            if request.punctuation && rng.gen_bool(PUNCTUATION_CHANCE) {
                if let Some(mark) = PUNCTUATION.choose(rng) {
                    word.push(*mark);
                }
            }
            words.push(word);
        }
        words
    }
}

/// Easy sticks to short words, hard prefers long ones. Falls back to the
/// whole list when the filter leaves nothing.
fn complexity_pool(words: &[String], complexity: Complexity) -> Vec<&str> {
    let keep = |w: &&String| {
        let len = w.chars().count();
        match complexity {
            Complexity::Easy => len <= 5,
            Complexity::Medium => true,
            Complexity::Hard => len >= 5,
        }
    };
    let pool: Vec<&str> = words.iter().filter(keep).map(String::as_str).collect();
    if pool.is_empty() {
        words.iter().map(String::as_str).collect()
    } else {
        pool
    }
}

impl WordSource for WordlistSource {
    fn name(&self) -> &str {
        &self.list.name
    }

    fn words(&self, request: &WordRequest) -> Result<Vec<String>, SourceError> {
        if self.list.words.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(self.generate(request, &mut rand::thread_rng()))
    }
}

/// Generated English sentences. Complexity changes how many adjectives and
/// adverbs each sentence carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSource;

impl SentenceSource {
    pub fn generate<R: Rng>(
        &self,
        request: &WordRequest,
        rng: &mut R,
    ) -> Result<Vec<String>, SourceError> {
        let mut words = Vec::with_capacity(request.count);

        for _ in 0..MAX_SENTENCES {
            if words.len() >= request.count {
                break;
            }
            let sentence = match request.complexity {
                Complexity::Easy => cgisf(1, 1, 1, rng.gen_bool(0.5), 1, rng.gen_bool(0.5)),
                Complexity::Medium => cgisf(
                    rng.gen_range(1..3),
                    rng.gen_range(1..3),
                    rng.gen_range(1..5),
                    rng.gen_bool(0.5),
                    rng.gen_range(1..3),
                    rng.gen_bool(0.5),
                ),
                Complexity::Hard => cgisf(
                    rng.gen_range(2..4),
                    rng.gen_range(2..4),
                    rng.gen_range(3..6),
                    rng.gen_bool(0.5),
                    rng.gen_range(2..4),
                    rng.gen_bool(0.5),
                ),
            };
            words.extend(sentence.split_whitespace().map(str::to_string));
        }

        if words.len() < request.count {
            return Err(SourceError::Generation(format!(
                "only {} of {} words generated",
                words.len(),
                request.count
            )));
        }
        words.truncate(request.count);
        Ok(words)
    }
}

impl WordSource for SentenceSource {
    fn name(&self) -> &str {
        "sentence"
    }

    fn words(&self, request: &WordRequest) -> Result<Vec<String>, SourceError> {
        self.generate(request, &mut rand::thread_rng())
    }
}

/// Fixed text supplied by the user, e.g. a quote.
#[derive(Debug, Clone)]
pub struct PromptSource {
    text: String,
}

impl PromptSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl WordSource for PromptSource {
    fn name(&self) -> &str {
        "prompt"
    }

    /// The whole prompt, whatever the requested count.
    fn words(&self, _request: &WordRequest) -> Result<Vec<String>, SourceError> {
        Ok(self.text.split_whitespace().map(str::to_string).collect())
    }
}

/// Asks `primary` for words and falls back on failure. Never returns an
/// empty list.
pub fn load_words(
    primary: &dyn WordSource,
    fallback: Option<&dyn WordSource>,
    request: &WordRequest,
) -> Result<Vec<String>, SourceError> {
    let words = match (primary.words(request), fallback) {
        (Ok(words), _) => words,
        (Err(e), Some(fallback)) => {
            warn!(
                "{} source failed ({e}), falling back to {}",
                primary.name(),
                fallback.name()
            );
            fallback.words(request)?
        }
        (Err(e), None) => return Err(e),
    };

    if words.is_empty() {
        return Err(SourceError::Empty);
    }
    debug!("loaded {} words from {}", words.len(), primary.name());
    Ok(words)
}
