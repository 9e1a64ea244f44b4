use std::time::{Duration, Instant};

/// Host tick cadence.
pub const TICK_RATE_MS: u64 = 100;

/// Count-down clock for timed tests, advanced by host ticks. Ticks given
/// through `on_tick_at` take off the wall-clock time since the previous one,
/// so late or missing ticks do not slow the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    limit_secs: f64,
    remaining_secs: f64,
    running: bool,
    expired: bool,
    last_tick: Option<Instant>,
}

impl Countdown {
    pub fn new(limit_secs: f64) -> Self {
        Self {
            limit_secs,
            remaining_secs: limit_secs,
            running: false,
            expired: false,
            last_tick: None,
        }
    }

    pub fn limit_secs(&self) -> f64 {
        self.limit_secs
    }

    pub fn remaining_secs(&self) -> f64 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.limit_secs - self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// No effect once expired; call `reset` first.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if !self.expired {
            self.running = true;
            self.last_tick = Some(now);
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.last_tick = None;
    }

    pub fn reset(&mut self) {
        self.remaining_secs = self.limit_secs;
        self.running = false;
        self.expired = false;
        self.last_tick = None;
    }

    /// Takes off the time since the previous tick (or since `start_at`).
    pub fn on_tick_at(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        let since = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        self.on_tick(since)
    }

    /// Returns true on the tick that runs the clock out, and only then.
    pub fn on_tick(&mut self, dt: Duration) -> bool {
        if !self.running {
            return false;
        }

        self.remaining_secs -= dt.as_secs_f64();
        if self.remaining_secs <= 1e-9 {
            self.remaining_secs = 0.0;
            self.running = false;
            self.last_tick = None;
            self.expired = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(TICK_RATE_MS);

    #[test]
    fn test_idle_until_started() {
        let mut timer = Countdown::new(1.0);
        assert!(!timer.on_tick(TICK));
        assert_eq!(timer.remaining_secs(), 1.0);
    }

    #[test]
    fn test_fires_exactly_once() {
        let mut timer = Countdown::new(1.0);
        timer.start();

        let fired: Vec<bool> = (0..15).map(|_| timer.on_tick(TICK)).collect();

        assert_eq!(fired.iter().filter(|f| **f).count(), 1);
        assert!(fired[9]);
        assert!(timer.is_expired());
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_secs(), 0.0);
        assert_eq!(timer.elapsed_secs(), 1.0);
    }

    #[test]
    fn test_pause_holds_time() {
        let mut timer = Countdown::new(2.0);
        timer.start();
        timer.on_tick(Duration::from_millis(500));
        timer.pause();
        timer.on_tick(Duration::from_millis(500));

        assert_eq!(timer.remaining_secs(), 1.5);
    }

    #[test]
    fn test_wall_clock_ticks_ignore_cadence() {
        let start = Instant::now();
        let mut timer = Countdown::new(1.0);
        timer.start_at(start);

        // one late tick covers everything since the start
        assert!(!timer.on_tick_at(start + Duration::from_millis(700)));
        assert!((timer.remaining_secs() - 0.3).abs() < 1e-9);
        assert!(timer.on_tick_at(start + Duration::from_millis(1000)));
        assert!(!timer.on_tick_at(start + Duration::from_millis(1100)));
    }

    #[test]
    fn test_pause_drops_the_gap() {
        let start = Instant::now();
        let mut timer = Countdown::new(2.0);
        timer.start_at(start);
        timer.on_tick_at(start + Duration::from_millis(500));
        timer.pause();

        let resumed = start + Duration::from_secs(10);
        timer.start_at(resumed);
        timer.on_tick_at(resumed + Duration::from_millis(500));
        assert!((timer.remaining_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_rearms() {
        let mut timer = Countdown::new(0.1);
        timer.start();
        assert!(timer.on_tick(TICK));

        timer.start();
        assert!(!timer.is_running());

        timer.reset();
        timer.start();
        assert_eq!(timer.remaining_secs(), 0.1);
        assert!(timer.on_tick(TICK));
    }
}
