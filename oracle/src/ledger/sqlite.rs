//! SQLite-backed prediction store and diagnostic log.

use super::{
    Correctness, DiagnosticLog, Direction, NewPrediction, PredictionRecord, PredictionStore,
    Reconciliation,
};
use crate::error::{OracleError, OracleResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bitcoin_predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    content TEXT NOT NULL,
    direction TEXT,
    observed_price REAL NOT NULL,
    predicted_price REAL,
    reconciled_price REAL,
    rightness TEXT NOT NULL DEFAULT 'NOT CHECKED',
    price_rightness TEXT
);

CREATE INDEX IF NOT EXISTS idx_predictions_rightness_created
    ON bitcoin_predictions(rightness, created_at);

CREATE TABLE IF NOT EXISTS tarot_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    content TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open_at<P: AsRef<Path>>(path: P) -> OracleResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!(path = %path.as_ref().display(), "opened prediction store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> OracleResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> OracleResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> OracleResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OracleError::StorageFailed("connection mutex poisoned".to_string()))
    }

    /// Every stored prediction, oldest first.
    pub fn predictions(&self) -> OracleResult<Vec<PredictionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, content, direction, observed_price, predicted_price,
                    reconciled_price, rightness, price_rightness
             FROM bitcoin_predictions
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], read_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Diagnostic log contents, oldest first.
    pub fn logs(&self) -> OracleResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT content FROM tarot_logs ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    Ok(PredictionRecord {
        id: row.get(0)?,
        created_at: row.get::<_, DateTime<Utc>>(1)?,
        content: row.get(2)?,
        direction: parse_column::<Direction>(row.get(3)?),
        observed_price: row.get(4)?,
        predicted_price: row.get(5)?,
        reconciled_price: row.get(6)?,
        rightness: parse_column::<Correctness>(row.get(7)?).unwrap_or(Correctness::NotChecked),
        price_rightness: parse_column::<Correctness>(row.get(8)?),
    })
}

/// Unknown strings read back as absent rather than failing the whole query.
fn parse_column<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|raw| raw.parse().ok())
}

#[async_trait]
impl PredictionStore for SqliteStore {
    async fn insert(&self, prediction: &NewPrediction) -> OracleResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bitcoin_predictions
                (created_at, content, direction, observed_price, predicted_price, rightness, price_rightness)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Utc::now(),
                &prediction.content,
                prediction.direction.map(|d| d.to_string()),
                prediction.observed_price,
                prediction.predicted_price,
                Correctness::NotChecked.to_string(),
                prediction
                    .predicted_price
                    .map(|_| Correctness::NotChecked.to_string()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn latest_pending(&self, limit: usize) -> OracleResult<Vec<PredictionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, content, direction, observed_price, predicted_price,
                    reconciled_price, rightness, price_rightness
             FROM bitcoin_predictions
             WHERE rightness = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(
            params![Correctness::NotChecked.to_string(), limit],
            read_record,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_correctness(&self, update: &Reconciliation) -> OracleResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE bitcoin_predictions
             SET rightness = ?1, price_rightness = ?2, reconciled_price = ?3
             WHERE id = ?4",
            params![
                update.rightness.to_string(),
                update.price_rightness.map(|c| c.to_string()),
                update.reconciled_price,
                update.id,
            ],
        )?;
        if changed == 0 {
            return Err(OracleError::StorageFailed(format!(
                "no prediction with id {}",
                update.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DiagnosticLog for SqliteStore {
    async fn append(&self, content: &str) -> OracleResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tarot_logs (created_at, content) VALUES (?1, ?2)",
            params![Utc::now(), content],
        )?;
        Ok(())
    }
}
