use std::sync::mpsc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use spelltype::announce::NullAnnouncer;
use spelltype::runtime::{
    apply, Applied, FixedTicker, KeyAction, Runner, SessionEvent, TestEventSource,
};
use spelltype::session::{Advance, Session, SessionOptions, SessionStatus};
use spelltype::timer::Countdown;

fn key(c: char) -> SessionEvent {
    SessionEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn session(words: &[&str]) -> Session {
    Session::new(words, SessionOptions::default(), Box::new(NullAnnouncer)).unwrap()
}

// Headless integration using the runtime + Session without a TTY
#[test]
fn headless_typing_flow_completes() {
    let mut session = session(&["hi", "yo"]);

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    for c in "hi yo ".chars() {
        tx.send(key(c)).unwrap();
    }

    let mut result = None;
    for _ in 0..100u32 {
        match runner.step() {
            SessionEvent::Tick => session.on_tick_at(Instant::now()),
            SessionEvent::Resize => {}
            SessionEvent::Key(key) => {
                let Some(action) = KeyAction::from_key(&key) else {
                    continue;
                };
                if let Applied::Advance(Advance::Completed(r)) =
                    apply(&mut session, action, Instant::now())
                {
                    result = Some(r);
                    break;
                }
            }
        }
    }

    let result = result.expect("session should have finished typing");
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(result.character_stats.correct, 4);
    assert_eq!(result.accuracy, 100.0);
    assert!(result.wpm >= 0.0);
}

#[test]
fn headless_strict_flow_blocks_until_fixed() {
    let mut session = session(&["ab"]);
    let now = Instant::now();

    assert_matches!(
        apply(&mut session, KeyAction::Type('x'), now),
        Applied::Key(_)
    );
    assert_matches!(
        apply(&mut session, KeyAction::Space, now),
        Applied::Advance(Advance::Blocked)
    );

    assert_matches!(
        apply(&mut session, KeyAction::Backspace, now),
        Applied::Erased(true)
    );
    apply(&mut session, KeyAction::Type('a'), now);
    apply(&mut session, KeyAction::Type('b'), now);
    assert_matches!(
        apply(&mut session, KeyAction::Space, now),
        Applied::Advance(Advance::Completed(_))
    );
}

#[test]
fn headless_timed_session_finishes_by_countdown() {
    let options = SessionOptions {
        mode: spelltype::result::TestMode::Time,
        mode_value: 1,
        ..SessionOptions::default()
    };
    let mut session =
        Session::new(&["hello", "there"], options, Box::new(NullAnnouncer)).unwrap();
    let mut countdown = Countdown::new(0.2);

    let start = Instant::now();
    session.handle_key_press_at('h', start);
    countdown.start();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(10)),
    );

    let mut finished = None;
    for _ in 0..50u32 {
        if let SessionEvent::Tick = runner.step() {
            if countdown.on_tick(Duration::from_millis(10)) {
                finished = session.force_complete();
                break;
            }
        }
    }

    let result = finished.expect("timed session should finish by timeout");
    assert!(countdown.is_expired());
    assert_eq!(result.character_stats.correct, 1);
    assert!(session.force_complete().is_none());
}

#[test]
fn headless_countdown_expires_on_time_while_typing() {
    let mut session = session(&["steady", "typing", "never", "stops", "here"]);
    let mut countdown = Countdown::new(1.0);

    let (tx, rx) = mpsc::channel();
    let typist = std::thread::spawn(move || {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(1500) {
            if tx.send(key('x')).is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(60));
        }
    });

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(100)),
    );
    let start = Instant::now();
    countdown.start_at(start);

    let mut ticks = 0u32;
    let mut finished = None;
    while start.elapsed() < Duration::from_secs(3) {
        match runner.step() {
            SessionEvent::Tick => {
                ticks += 1;
                let now = Instant::now();
                session.on_tick_at(now);
                if countdown.on_tick_at(now) {
                    finished = session.force_complete_at(now);
                    break;
                }
            }
            SessionEvent::Key(key) => {
                if let Some(action) = KeyAction::from_key(&key) {
                    apply(&mut session, action, Instant::now());
                }
            }
            SessionEvent::Resize => {}
        }
    }
    let wall = start.elapsed();
    drop(runner);
    typist.join().unwrap();

    assert!(countdown.is_expired(), "countdown stalled after {wall:?}");
    assert!(wall < Duration::from_millis(1400), "expired late: {wall:?}");
    assert!(ticks >= 8, "only {ticks} ticks while typing");
    assert!(finished.is_some());
}
