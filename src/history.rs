use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::result::{CharacterStats, SessionResult, TestMode};
use crate::session::WordError;

/// Results kept in the store; older ones are dropped on save.
pub const MAX_RESULTS: usize = 100;
/// Mistakes kept in the store.
pub const MAX_WORD_ERRORS: usize = 1000;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no state directory available")]
    NoStateDir,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonalBests {
    pub best_wpm: Option<SessionResult>,
    pub best_accuracy: Option<SessionResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MistakeCount {
    pub word: String,
    pub count: usize,
}

/// One line of the CSV export.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    finished_at: String,
    mode: String,
    mode_value: u32,
    wpm: f64,
    raw_wpm: f64,
    accuracy: f64,
    consistency: f64,
    duration: f64,
    characters_typed: usize,
    correct: usize,
    incorrect: usize,
    extra: usize,
    missed: usize,
    language: &'a str,
}

impl<'a> From<&'a SessionResult> for CsvRow<'a> {
    fn from(r: &'a SessionResult) -> Self {
        Self {
            id: &r.id,
            finished_at: r
                .finished_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            mode: r.mode.to_string(),
            mode_value: r.mode_value,
            wpm: r.wpm,
            raw_wpm: r.raw_wpm,
            accuracy: r.accuracy,
            consistency: r.consistency,
            duration: r.duration,
            characters_typed: r.characters_typed,
            correct: r.character_stats.correct,
            incorrect: r.character_stats.incorrect,
            extra: r.character_stats.extra,
            missed: r.character_stats.missed,
            language: &r.language,
        }
    }
}

/// Finished sessions and the words that tripped the typist up.
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

const RESULT_COLUMNS: &str = "id, wpm, raw_wpm, accuracy, consistency, mode, mode_value, \
     duration, characters_typed, correct, incorrect, extra, missed, timestamp, language";

impl HistoryDb {
    /// Opens the store in the state directory, creating it if needed.
    pub fn new() -> Result<Self, HistoryError> {
        let path = AppDirs::db_path().ok_or(HistoryError::NoStateDir)?;
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        debug!("history at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id TEXT PRIMARY KEY,
                wpm REAL NOT NULL,
                raw_wpm REAL NOT NULL,
                accuracy REAL NOT NULL,
                consistency REAL NOT NULL,
                mode TEXT NOT NULL,
                mode_value INTEGER NOT NULL,
                duration REAL NOT NULL,
                characters_typed INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                incorrect INTEGER NOT NULL,
                extra INTEGER NOT NULL,
                missed INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                language TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_timestamp ON results(timestamp);

            CREATE TABLE IF NOT EXISTS word_errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                expected TEXT NOT NULL,
                typed TEXT NOT NULL,
                position INTEGER NOT NULL,
                corrected BOOLEAN NOT NULL,
                recorded_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_word_errors_expected ON word_errors(expected);
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn default_path() -> Option<PathBuf> {
        AppDirs::db_path()
    }

    pub fn save_result(&mut self, result: &SessionResult) -> Result<(), HistoryError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO results ({RESULT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                result.id,
                result.wpm,
                result.raw_wpm,
                result.accuracy,
                result.consistency,
                result.mode.to_string(),
                result.mode_value,
                result.duration,
                result.characters_typed as i64,
                result.character_stats.correct as i64,
                result.character_stats.incorrect as i64,
                result.character_stats.extra as i64,
                result.character_stats.missed as i64,
                result.timestamp,
                result.language,
            ],
        )?;
        tx.execute(
            "DELETE FROM results WHERE id NOT IN \
             (SELECT id FROM results ORDER BY timestamp DESC, rowid DESC LIMIT ?1)",
            params![MAX_RESULTS as i64],
        )?;
        tx.commit()?;

        info!("saved result {} ({} wpm)", result.id, result.wpm);
        Ok(())
    }

    /// Newest first.
    pub fn recent_results(&self, limit: usize) -> Result<Vec<SessionResult>, HistoryError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM results ORDER BY timestamp DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], result_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn result_count(&self) -> Result<usize, HistoryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn personal_bests(&self) -> Result<PersonalBests, HistoryError> {
        let best = |order: &str| -> Result<Option<SessionResult>, HistoryError> {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM results ORDER BY {order} LIMIT 1"
            ))?;
            let mut rows = stmt.query_map([], result_from_row)?;
            Ok(rows.next().transpose()?)
        };

        Ok(PersonalBests {
            best_wpm: best("wpm DESC, accuracy DESC, timestamp ASC")?,
            best_accuracy: best("accuracy DESC, wpm DESC, timestamp ASC")?,
        })
    }

    pub fn record_word_errors(
        &mut self,
        session_id: &str,
        errors: &[WordError],
    ) -> Result<(), HistoryError> {
        self.record_word_errors_at(session_id, errors, Utc::now())
    }

    pub fn record_word_errors_at(
        &mut self,
        session_id: &str,
        errors: &[WordError],
        at: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        if errors.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for error in errors {
            tx.execute(
                r#"
                INSERT INTO word_errors (session_id, expected, typed, position, corrected, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    session_id,
                    error.expected,
                    error.typed,
                    error.position as i64,
                    error.corrected,
                    at.timestamp_millis(),
                ],
            )?;
        }
        tx.execute(
            "DELETE FROM word_errors WHERE id NOT IN \
             (SELECT id FROM word_errors ORDER BY id DESC LIMIT ?1)",
            params![MAX_WORD_ERRORS as i64],
        )?;
        tx.commit()?;

        debug!("recorded {} mistakes for {session_id}", errors.len());
        Ok(())
    }

    /// Words missed most often, most frequent first.
    pub fn common_mistakes(&self, limit: usize) -> Result<Vec<MistakeCount>, HistoryError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT expected, COUNT(*) AS misses
            FROM word_errors
            GROUP BY expected
            ORDER BY misses DESC, expected ASC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MistakeCount {
                word: row.get(0)?,
                count: row.get::<_, i64>(1)? as usize,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Drops mistakes older than `days_to_keep` days. Returns how many went.
    pub fn clear_old_errors(&self, days_to_keep: u32) -> Result<usize, HistoryError> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days_to_keep));
        let removed = self.conn.execute(
            "DELETE FROM word_errors WHERE recorded_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        Ok(removed)
    }

    pub fn clear_all(&self) -> Result<(), HistoryError> {
        self.conn
            .execute_batch("DELETE FROM results; DELETE FROM word_errors;")?;
        Ok(())
    }

    /// Writes every stored result, oldest first. Returns the row count.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize, HistoryError> {
        let mut results = self.recent_results(MAX_RESULTS)?;
        results.reverse();

        let mut wtr = csv::Writer::from_writer(writer);
        for result in &results {
            wtr.serialize(CsvRow::from(result))?;
        }
        wtr.flush()?;
        Ok(results.len())
    }
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<SessionResult> {
    let mode: String = row.get(5)?;
    Ok(SessionResult {
        id: row.get(0)?,
        wpm: row.get(1)?,
        raw_wpm: row.get(2)?,
        accuracy: row.get(3)?,
        consistency: row.get(4)?,
        mode: TestMode::from_name(&mode).unwrap_or_default(),
        mode_value: row.get(6)?,
        duration: row.get(7)?,
        characters_typed: row.get::<_, i64>(8)? as usize,
        character_stats: CharacterStats {
            correct: row.get::<_, i64>(9)? as usize,
            incorrect: row.get::<_, i64>(10)? as usize,
            extra: row.get::<_, i64>(11)? as usize,
            missed: row.get::<_, i64>(12)? as usize,
        },
        timestamp: row.get(13)?,
        language: row.get(14)?,
    })
}
