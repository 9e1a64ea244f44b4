use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::assist::DEFAULT_HINT_THRESHOLD;
use crate::policy::AdvancePolicy;
use crate::result::TestMode;
use crate::session::SessionOptions;
use crate::source::{Complexity, SourceKind, WordRequest, WordlistSource};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config encode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: TestMode,
    pub number_of_words: u32,
    pub number_of_secs: u32,
    pub source: SourceKind,
    pub word_list: String,
    pub complexity: Complexity,
    pub punctuation: bool,
    pub numbers: bool,
    pub policy: AdvancePolicy,
    pub speech: bool,
    pub speech_command: String,
    pub hint_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: TestMode::Words,
            number_of_words: 25,
            number_of_secs: 30,
            source: SourceKind::Wordlist,
            word_list: WordlistSource::DEFAULT_LIST.to_string(),
            complexity: Complexity::Medium,
            punctuation: false,
            numbers: false,
            policy: AdvancePolicy::Strict,
            speech: false,
            speech_command: "espeak".to_string(),
            hint_threshold: DEFAULT_HINT_THRESHOLD,
        }
    }
}

impl Config {
    /// Seconds in time mode, the word target otherwise. Never 0.
    pub fn mode_value(&self) -> u32 {
        let value = match self.mode {
            TestMode::Time => self.number_of_secs,
            TestMode::Words | TestMode::Quote => self.number_of_words,
        };
        value.max(1)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mode: self.mode,
            mode_value: self.mode_value(),
            policy: self.policy,
            hint_threshold: self.hint_threshold.max(1),
            language: self.word_list.clone(),
        }
    }

    /// Timed tests ask for more words than anyone can type in the window.
    pub fn word_request(&self) -> WordRequest {
        let count = match self.mode {
            TestMode::Time => (self.mode_value() as usize * 4).max(50),
            TestMode::Words | TestMode::Quote => self.mode_value() as usize,
        };
        WordRequest {
            count,
            complexity: self.complexity,
            punctuation: self.punctuation,
            numbers: self.numbers,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files give the defaults.
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("ignoring invalid config {}: {e}", self.path.display());
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
