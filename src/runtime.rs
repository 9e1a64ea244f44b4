use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;

use crate::session::{Advance, Keystroke, Session};

/// Everything the session loop reacts to.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread.
pub struct CrosstermEventSource {
    rx: Receiver<SessionEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(SessionEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => tx.send(SessionEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    debug!("terminal event stream closed: {e}");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for headless runs.
pub struct TestEventSource {
    rx: Receiver<SessionEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<SessionEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<SessionEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Hands out one event at a time. Whoever calls `step` owns the session, so
/// grading never runs on two threads at once.
///
/// Ticks are due on a fixed schedule; a steady stream of keys cannot hold
/// them back.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Cell<Instant>,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Cell::new(Instant::now() + ticker.interval());
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    /// Returns Tick when one is due, else the next event, blocking no
    /// longer than the time left until the next tick.
    pub fn step(&self) -> SessionEvent {
        let now = Instant::now();
        let due = self.next_tick.get();
        if now >= due {
            return self.tick(now);
        }

        match self.event_source.recv_timeout(due - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.tick(Instant::now())
            }
        }
    }

    fn tick(&self, now: Instant) -> SessionEvent {
        let interval = self.ticker.interval();
        let mut next = self.next_tick.get() + interval;
        // after a long stall, skip the missed ticks rather than burst them
        if next <= now {
            next = now + interval;
        }
        self.next_tick.set(next);
        SessionEvent::Tick
    }
}

/// What a key means to the typing screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Type(char),
    Backspace,
    Space,
    /// Same words again.
    Restart,
    /// Fresh words.
    NewWords,
    Quit,
}

impl KeyAction {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }

        match key.code {
            KeyCode::Esc => Some(KeyAction::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(KeyAction::Quit)
            }
            KeyCode::Tab => Some(KeyAction::Restart),
            KeyCode::Right => Some(KeyAction::NewWords),
            KeyCode::Backspace => Some(KeyAction::Backspace),
            KeyCode::Char(' ') => Some(KeyAction::Space),
            KeyCode::Char(c) => Some(KeyAction::Type(c)),
            _ => None,
        }
    }
}

/// Result of feeding one typing action to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Key(Keystroke),
    Erased(bool),
    Advance(Advance),
    /// Not a typing action; the host decides.
    Host(KeyAction),
}

pub fn apply(session: &mut Session, action: KeyAction, now: Instant) -> Applied {
    match action {
        KeyAction::Type(c) => Applied::Key(session.handle_key_press_at(c, now)),
        KeyAction::Backspace => Applied::Erased(session.handle_backspace()),
        KeyAction::Space => Applied::Advance(session.handle_space_at(now)),
        other => Applied::Host(other),
    }
}
