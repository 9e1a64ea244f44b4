mod ui;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use log::{error, info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs::File,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};

use spelltype::{
    announce::{Announcer, CommandSink, NullAnnouncer, SpeechAnnouncer},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::{HistoryDb, PersonalBests},
    policy::AdvancePolicy,
    result::{SessionResult, TestMode},
    runtime::{
        apply, Applied, CrosstermEventSource, FixedTicker, KeyAction, Runner, SessionEvent,
    },
    session::{Advance, Session},
    source::{
        load_words, Complexity, PromptSource, SentenceSource, SourceKind, WordSource,
        WordlistSource,
    },
    timer::{Countdown, TICK_RATE_MS},
};

/// typing practice that reads your mistakes back to you
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Typing practice with per-keystroke grading, live speed and accuracy, and a correction hint (optionally spoken aloud) whenever a word goes wrong."
)]
pub struct Cli {
    /// how the test ends
    #[clap(short = 'm', long, value_enum)]
    mode: Option<TestMode>,

    /// number of words to use in test
    #[clap(short = 'w', long = "words")]
    number_of_words: Option<u32>,

    /// number of seconds to run test (implies --mode time)
    #[clap(short = 's', long = "seconds")]
    number_of_secs: Option<u32>,

    /// custom prompt to use (implies --mode quote)
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// where words come from
    #[clap(long, value_enum)]
    source: Option<SourceKind>,

    /// word difficulty
    #[clap(short = 'c', long, value_enum)]
    complexity: Option<Complexity>,

    /// sprinkle punctuation into the words
    #[clap(long)]
    punctuation: bool,

    /// mix numbers into the words
    #[clap(long)]
    numbers: bool,

    /// let space skip a word even when it has mistakes
    #[clap(long)]
    free: bool,

    /// read the correct word aloud after a mistake
    #[clap(long)]
    speech: bool,

    /// print recent results and exit
    #[clap(long)]
    history: bool,

    /// write every stored result to a CSV file and exit
    #[clap(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

impl Cli {
    /// Flags win over the stored config.
    fn apply_to(&self, mut cfg: Config) -> Config {
        if let Some(words) = self.number_of_words {
            cfg.number_of_words = words;
        }
        if let Some(secs) = self.number_of_secs {
            cfg.number_of_secs = secs;
            cfg.mode = TestMode::Time;
        }
        if self.prompt.is_some() {
            cfg.mode = TestMode::Quote;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(complexity) = self.complexity {
            cfg.complexity = complexity;
        }
        cfg.punctuation |= self.punctuation;
        cfg.numbers |= self.numbers;
        if self.free {
            cfg.policy = AdvancePolicy::Free;
        }
        cfg.speech |= self.speech;
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
}

pub struct App {
    pub config: Config,
    pub prompt: Option<String>,
    pub session: Session,
    pub countdown: Option<Countdown>,
    pub state: AppState,
    pub history: Option<HistoryDb>,
    pub bests: PersonalBests,
    pub status: Option<String>,
}

impl App {
    pub fn new(config: Config, prompt: Option<String>, history: Option<HistoryDb>) -> Result<Self> {
        let session = build_session(&config, prompt.as_deref())?;
        let bests = history
            .as_ref()
            .and_then(|db| db.personal_bests().ok())
            .unwrap_or_default();

        Ok(Self {
            countdown: countdown_for(&config),
            config,
            prompt,
            session,
            state: AppState::Typing,
            history,
            bests,
            status: None,
        })
    }

    /// Same words, clean slate.
    pub fn restart(&mut self) {
        self.session.reset();
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.reset();
        }
        self.state = AppState::Typing;
        self.status = None;
    }

    pub fn new_words(&mut self) -> Result<()> {
        self.session.reset();
        self.session = build_session(&self.config, self.prompt.as_deref())?;
        self.countdown = countdown_for(&self.config);
        self.state = AppState::Typing;
        self.status = None;
        Ok(())
    }

    /// Returns false when the user asked to quit.
    pub fn on_action(&mut self, action: KeyAction, now: Instant) -> Result<bool> {
        match action {
            KeyAction::Quit => return Ok(false),
            KeyAction::Restart => self.restart(),
            KeyAction::NewWords => self.new_words()?,
            _ if self.state == AppState::Results => {}
            typing => {
                if let Applied::Advance(Advance::Completed(result)) =
                    apply(&mut self.session, typing, now)
                {
                    self.finish(result);
                } else if self.session.has_started() {
                    if let Some(countdown) = self.countdown.as_mut() {
                        if !countdown.is_running() && !countdown.is_expired() {
                            countdown.start_at(self.session.state().start_time.unwrap_or(now));
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    pub fn on_tick(&mut self, now: Instant) {
        if self.state != AppState::Typing {
            return;
        }
        self.session.on_tick_at(now);

        let expired = self
            .countdown
            .as_mut()
            .is_some_and(|c| c.on_tick_at(now));
        if expired {
            if let Some(result) = self.session.force_complete_at(now) {
                self.finish(result);
            }
        }
    }

    fn finish(&mut self, result: SessionResult) {
        self.state = AppState::Results;
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.pause();
        }

        let errors = self.session.take_word_errors();
        let Some(db) = self.history.as_mut() else {
            return;
        };

        let saved = db
            .save_result(&result)
            .and_then(|_| db.record_word_errors(&result.id, &errors))
            .and_then(|_| db.personal_bests());
        match saved {
            Ok(bests) => self.bests = bests,
            Err(e) => {
                error!("failed to store result {}: {e}", result.id);
                self.status = Some(format!("history not saved: {e}"));
            }
        }
    }
}

fn countdown_for(config: &Config) -> Option<Countdown> {
    (config.mode == TestMode::Time).then(|| Countdown::new(config.mode_value() as f64))
}

fn build_announcer(config: &Config) -> Box<dyn Announcer> {
    if config.speech {
        Box::new(SpeechAnnouncer::new(CommandSink::new(
            config.speech_command.clone(),
        )))
    } else {
        Box::new(NullAnnouncer)
    }
}

fn build_session(config: &Config, prompt: Option<&str>) -> Result<Session> {
    let request = config.word_request();
    let fallback = WordlistSource::embedded(WordlistSource::DEFAULT_LIST)
        .context("loading the built-in word list")?;

    let words = match (prompt, config.source) {
        (Some(text), _) => load_words(&PromptSource::new(text), None, &request)?,
        (None, SourceKind::Sentence) => {
            load_words(&SentenceSource, Some(&fallback as &dyn WordSource), &request)?
        }
        (None, SourceKind::Wordlist) => {
            let primary = WordlistSource::embedded(&config.word_list);
            match &primary {
                Ok(list) => load_words(list, Some(&fallback as &dyn WordSource), &request)?,
                Err(e) => {
                    warn!("word list {:?} unavailable: {e}", config.word_list);
                    load_words(&fallback, None, &request)?
                }
            }
        }
    };

    let mut options = config.session_options();
    if config.mode == TestMode::Quote {
        options.mode_value = words.len() as u32;
    }

    Ok(Session::new(&words, options, build_announcer(config))?)
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = File::create(&path) else {
        return;
    };

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn print_history(db: &HistoryDb) -> Result<()> {
    let results = db.recent_results(20)?;
    if results.is_empty() {
        println!("no results yet");
        return Ok(());
    }

    for r in &results {
        let when = r
            .finished_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{when}  {:>6} {:<3}  {:>6.2} wpm  {:>6.2}% acc  {:>6.2}% cons",
            r.mode.to_string(),
            r.mode_value,
            r.wpm,
            r.accuracy,
            r.consistency
        );
    }

    let mistakes = db.common_mistakes(5)?;
    if !mistakes.is_empty() {
        println!(
            "\nmost missed: {}",
            mistakes
                .iter()
                .map(|m| format!("{} ({}x)", m.word, m.count))
                .join(", ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    if cli.history || cli.export.is_some() {
        let db = HistoryDb::new()?;
        if let Some(path) = &cli.export {
            let rows = db.export_csv(File::create(path)?)?;
            println!("exported {rows} results to {}", path.display());
        }
        if cli.history {
            print_history(&db)?;
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if let Err(e) = store.save(&config) {
        warn!("could not save config: {e}");
    }

    let history = match HistoryDb::new() {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("history disabled: {e}");
            None
        }
    };
    let mut app = App::new(config, cli.prompt.clone(), history)?;
    info!("starting {} test", app.config.mode);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            SessionEvent::Tick => app.on_tick(Instant::now()),
            SessionEvent::Resize => {}
            SessionEvent::Key(key) => {
                let Some(action) = KeyAction::from_key(&key) else {
                    continue;
                };
                if !app.on_action(action, Instant::now())? {
                    break;
                }
            }
        }
    }

    Ok(())
}
