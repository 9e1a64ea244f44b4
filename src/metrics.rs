/// Characters that make up one "word" for speed calculations.
pub const CHARS_PER_WORD: f64 = 5.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Words per minute over `chars` characters typed in `elapsed_secs` seconds.
/// Returns 0 before any time has elapsed.
pub fn wpm(chars: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }

    let words = chars as f64 / CHARS_PER_WORD;
    let minutes = elapsed_secs / 60.0;

    round2(words / minutes)
}

/// WPM over every typed character, correct or not.
pub fn raw_wpm(correct: usize, incorrect: usize, extra: usize, elapsed_secs: f64) -> f64 {
    wpm(correct + incorrect + extra, elapsed_secs)
}

/// Percentage of `total_chars` that were correct. 100 when nothing was typed.
pub fn accuracy(correct_chars: usize, total_chars: usize) -> f64 {
    if total_chars == 0 {
        return 100.0;
    }

    let ratio = correct_chars.min(total_chars) as f64 / total_chars as f64;
    round2(ratio * 100.0)
}

/// Snapshot of the running numbers, recomputed on every tick for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveMetrics {
    pub wpm: f64,
    pub raw_wpm: f64,
    pub accuracy: f64,
    pub correct_chars: usize,
    pub incorrect_chars: usize,
    pub extra_chars: usize,
    pub total_chars: usize,
    pub elapsed_secs: f64,
}

impl LiveMetrics {
    pub fn compute(correct: usize, incorrect: usize, extra: usize, elapsed_secs: f64) -> Self {
        let total = correct + incorrect + extra;
        Self {
            wpm: wpm(correct, elapsed_secs),
            raw_wpm: wpm(total, elapsed_secs),
            accuracy: accuracy(correct, total),
            correct_chars: correct,
            incorrect_chars: incorrect,
            extra_chars: extra,
            total_chars: total,
            elapsed_secs,
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::compute(0, 0, 0, 0.0)
    }
}
