use spelltype::session::WpmSample;

/// X (seconds) and Y (wpm) bounds for the results chart
pub fn compute_chart_params(samples: &[WpmSample], duration: f64) -> (f64, f64) {
    let highest_wpm = samples
        .iter()
        .map(|s| s.wpm.max(s.raw_wpm))
        .fold(0.0, f64::max);

    let last = samples.last().map_or(duration, |s| s.second as f64);
    let overall_duration = last.max(duration).max(1.0);

    (overall_duration, highest_wpm.round().max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
