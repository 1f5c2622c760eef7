use std::path::Path;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS answer_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    context_chunks INTEGER NOT NULL,
    outcome TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_answer_log_timestamp ON answer_log(timestamp);
"#;

/// How a question ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered,
    Failed,
    TimedOut,
}

impl AnswerOutcome {
    fn as_str(self) -> &'static str {
        match self {
            AnswerOutcome::Answered => "answered",
            AnswerOutcome::Failed => "failed",
            AnswerOutcome::TimedOut => "timed_out",
        }
    }
}

/// SQLite log of answered questions.
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %e, "could not create metrics directory");
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "auto_vacuum", "INCREMENTAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record(&self, latency_ms: u64, context_chunks: usize, outcome: AnswerOutcome) {
        if let Err(e) = self.conn.execute(
            "INSERT INTO answer_log (timestamp, latency_ms, context_chunks, outcome)
             VALUES (datetime('now'), ?1, ?2, ?3)",
            params![latency_ms as i64, context_chunks as i64, outcome.as_str()],
        ) {
            warn!(error = %e, "failed to record answer metrics");
        }
    }

    pub fn get_summary(&self, retention_days: u32) -> MetricsSummary {
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total_questions,
                COALESCE(AVG(latency_ms), 0) as avg_latency_ms,
                COALESCE(AVG(context_chunks), 0) as avg_context_chunks,
                COALESCE(SUM(CASE WHEN outcome != 'answered' THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0) as error_rate,
                COALESCE(SUM(CASE WHEN outcome = 'timed_out' THEN 1 ELSE 0 END), 0) as timeouts
            FROM answer_log
            WHERE timestamp >= datetime('now', '-{} days')
            "#,
            retention_days
        );

        self.conn
            .query_row(&query, [], |row| {
                Ok(MetricsSummary {
                    total_questions: row.get::<_, i64>(0)? as u64,
                    avg_latency_ms: row.get::<_, f64>(1)? as u64,
                    avg_context_chunks: row.get::<_, f64>(2)? as f32,
                    error_rate: row.get::<_, f64>(3)? as f32,
                    timeouts: row.get::<_, i64>(4)? as u64,
                })
            })
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to read answer metrics");
                MetricsSummary::default()
            })
    }

    pub fn cleanup(&self, retention_days: u32) {
        let query = format!(
            "DELETE FROM answer_log WHERE timestamp < datetime('now', '-{} days')",
            retention_days
        );
        if let Err(e) = self.conn.execute(&query, []) {
            warn!(error = %e, "failed to prune answer metrics");
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_questions: u64,
    pub avg_latency_ms: u64,
    pub avg_context_chunks: f32,
    pub error_rate: f32,
    pub timeouts: u64,
}
