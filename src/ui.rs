pub mod charting;
pub mod screen;

use std::time::Instant;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use spelltype::{result::TestMode, word::CharStatus};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &mut App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn status_style(status: CharStatus) -> Style {
    match status {
        CharStatus::Pending => dim_bold(),
        CharStatus::Correct => bold().fg(Color::Green),
        CharStatus::Incorrect => bold().fg(Color::Red),
        CharStatus::Extra => Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::ITALIC | Modifier::CROSSED_OUT),
    }
}

/// The words being typed, the live numbers and the hint.
pub struct TypingView<'a>(pub &'a App);

impl TypingView<'_> {
    fn header(&self, now: Instant) -> String {
        let app = self.0;
        let session = &app.session;
        let live = session.live_metrics_at(now);

        let progress = match (&app.countdown, session.options().mode) {
            (Some(countdown), _) => format!("{:.1}", countdown.remaining_secs()),
            (None, TestMode::Time) => String::new(),
            (None, _) => format!(
                "{}/{}",
                session.state().current_word_index,
                session
                    .words()
                    .len()
                    .min(session.options().mode_value as usize)
            ),
        };

        if session.has_started() {
            format!(
                "{progress}   {:.0} wpm   {:.0}% acc",
                live.wpm, live.accuracy
            )
        } else {
            progress
        }
    }

    fn word_spans(&self) -> Vec<Span<'static>> {
        let session = &self.0.session;
        let cursor = session.state().current_char_index;
        let mut spans = Vec::new();

        for word in session.words() {
            for (idx, c) in word.characters().iter().enumerate() {
                let mut style = status_style(c.status);
                if word.is_active() && idx == cursor {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                if word.is_completed() && c.status == CharStatus::Pending {
                    style = style.fg(Color::Red);
                }
                spans.push(Span::styled(c.value.to_string(), style));
            }
            if word.is_active() && cursor >= word.characters().len() {
                spans.push(Span::styled(
                    " ",
                    dim_bold().add_modifier(Modifier::UNDERLINED),
                ));
            } else {
                spans.push(Span::raw(" "));
            }
        }
        spans
    }
}

impl Widget for TypingView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.0;
        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let text_width: usize = app
            .session
            .words()
            .iter()
            .map(|w| w.value().width() + w.extra_count() + 1)
            .sum();
        let prompt_lines = ((text_width as f64 / max_chars_per_line as f64).ceil() as u16).max(1);
        let filler = area.height.saturating_sub(prompt_lines + 5) / 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(filler),
                Constraint::Length(2),
                Constraint::Length(prompt_lines),
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled(self.header(Instant::now()), dim_bold()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        Paragraph::new(Line::from(self.word_spans()))
            .alignment(if prompt_lines == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        if let Some(hint) = app.session.hint() {
            Paragraph::new(Line::from(vec![
                Span::styled("correct word: ", Style::default().fg(Color::Yellow)),
                Span::styled(hint.to_string(), bold().fg(Color::Yellow)),
            ]))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(
            "(tab) restart / (→) new words / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[5], buf);
    }
}

/// Final numbers, the speed chart and personal bests.
pub struct ResultsView<'a>(pub &'a App);

impl Widget for ResultsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.0;
        let Some(result) = app.session.result() else {
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let samples = app.session.samples();
        let (overall_duration, highest_wpm) =
            charting::compute_chart_params(samples, result.duration);
        let wpm_points: Vec<(f64, f64)> = samples
            .iter()
            .map(|s| (s.second as f64, s.wpm))
            .collect();
        let raw_points: Vec<(f64, f64)> = samples
            .iter()
            .map(|s| (s.second as f64, s.raw_wpm))
            .collect();

        let datasets = vec![
            Dataset::default()
                .marker(ratatui::symbols::Marker::Braille)
                .style(Style::default().fg(Color::DarkGray))
                .graph_type(GraphType::Line)
                .data(&raw_points),
            Dataset::default()
                .marker(ratatui::symbols::Marker::Braille)
                .style(Style::default().fg(Color::Magenta))
                .graph_type(GraphType::Line)
                .data(&wpm_points),
        ];

        Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("seconds")
                    .bounds([1.0, overall_duration])
                    .labels(vec![
                        Span::styled("1", bold()),
                        Span::styled(charting::format_label(overall_duration), bold()),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("wpm")
                    .bounds([0.0, highest_wpm])
                    .labels(vec![
                        Span::styled("0", bold()),
                        Span::styled(charting::format_label(highest_wpm), bold()),
                    ]),
            )
            .render(chunks[0], buf);

        Paragraph::new(Span::styled(
            format!(
                "{} wpm   {}% acc   {} raw   {}% consistency",
                result.wpm, result.accuracy, result.raw_wpm, result.consistency
            ),
            bold(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        let stats = result.character_stats;
        Paragraph::new(Span::styled(
            format!(
                "{} {}   {:.1}s   correct {} / incorrect {} / extra {} / missed {}",
                result.mode,
                result.mode_value,
                result.duration,
                stats.correct,
                stats.incorrect,
                stats.extra,
                stats.missed
            ),
            dim_bold(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        let bests = match (&app.bests.best_wpm, &app.bests.best_accuracy) {
            (Some(fast), Some(clean)) => format!(
                "best: {} wpm   {}% acc{}",
                fast.wpm,
                clean.accuracy,
                if fast.id == result.id {
                    "   new personal best!"
                } else {
                    ""
                }
            ),
            _ => String::new(),
        };
        Paragraph::new(Span::styled(
            bests,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);

        if let Some(status) = &app.status {
            Paragraph::new(Span::styled(status.as_str(), Style::default().fg(Color::Red)))
                .alignment(Alignment::Center)
                .render(chunks[4], buf);
        }

        Paragraph::new(Span::styled(
            "(tab) retry / (→) new / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[5], buf);
    }
}
