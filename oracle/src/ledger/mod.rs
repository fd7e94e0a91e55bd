//! Persisted self-scoring of issued predictions.
//!
//! Each cycle first reconciles the previous pending prediction against the
//! price observed now, then records its own prediction as pending. The ledger
//! assumes a single writer; a mutex serializes callers that share one
//! instance, but two processes on the same store can still race.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::config::LedgerConfig;
use crate::error::{OracleError, OracleResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString, IntoStaticStr};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Directional claim of a prediction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Correctness {
    #[strum(serialize = "NOT CHECKED")]
    #[serde(rename = "NOT CHECKED")]
    NotChecked,
    Correct,
    Incorrect,
}

/// Which pending rows a reconciliation pass touches.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Only the most recently created pending row.
    #[default]
    Latest,
    /// Every pending row, newest first.
    AllPending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub direction: Option<Direction>,
    pub observed_price: f64,
    pub predicted_price: Option<f64>,
    pub reconciled_price: Option<f64>,
    pub rightness: Correctness,
    pub price_rightness: Option<Correctness>,
}

/// What the current cycle claims about the future.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PredictionClaim {
    pub direction: Option<Direction>,
    pub predicted_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub content: String,
    pub direction: Option<Direction>,
    pub observed_price: f64,
    pub predicted_price: Option<f64>,
}

/// Verdict written back to one pending row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub id: i64,
    pub rightness: Correctness,
    pub price_rightness: Option<Correctness>,
    pub reconciled_price: f64,
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Insert a `NOT CHECKED` row and return its id.
    async fn insert(&self, prediction: &NewPrediction) -> OracleResult<i64>;

    /// Pending rows, most recently created first.
    async fn latest_pending(&self, limit: usize) -> OracleResult<Vec<PredictionRecord>>;

    async fn update_correctness(&self, update: &Reconciliation) -> OracleResult<()>;
}

/// Append-only sink for diagnostic messages.
#[async_trait]
pub trait DiagnosticLog: Send + Sync {
    async fn append(&self, content: &str) -> OracleResult<()>;
}

/// `Correct` iff the price moved in the claimed direction. A row without a
/// claim can never be correct.
pub fn judge_direction(direction: Option<Direction>, issued_price: f64, current_price: f64) -> Correctness {
    let delta = current_price - issued_price;
    match direction {
        Some(Direction::Up) if delta > 0.0 => Correctness::Correct,
        Some(Direction::Down) if delta < 0.0 => Correctness::Correct,
        _ => Correctness::Incorrect,
    }
}

/// `Correct` iff `|current - predicted| / current <= tolerance`.
pub fn judge_price(predicted_price: f64, current_price: f64, tolerance: f64) -> Correctness {
    let relative_error = (current_price - predicted_price).abs() / current_price;
    if relative_error <= tolerance {
        Correctness::Correct
    } else {
        Correctness::Incorrect
    }
}

/// What one `record_and_reconcile` call did. Failures are already logged.
#[derive(Debug, Default)]
pub struct LedgerOutcome {
    pub reconciled: Vec<Reconciliation>,
    pub inserted_id: Option<i64>,
    pub reconcile_failed: bool,
    pub record_failed: bool,
}

/// Result of one pass over the pending rows.
#[derive(Debug, Default)]
struct PendingPass {
    applied: Vec<Reconciliation>,
    failed: Vec<(i64, OracleError)>,
}

pub struct PredictionLedger {
    store: Arc<dyn PredictionStore>,
    config: LedgerConfig,
    guard: Mutex<()>,
}

impl PredictionLedger {
    pub fn new(store: Arc<dyn PredictionStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            guard: Mutex::new(()),
        }
    }

    /// Reconcile pending rows against `current_price` without recording anything.
    ///
    /// Returns the updates that were written. Fails only when the pending
    /// rows cannot be read or when every update failed.
    pub async fn reconcile(&self, current_price: f64) -> OracleResult<Vec<Reconciliation>> {
        let _guard = self.guard.lock().await;
        let mut pass = self.reconcile_pending(current_price).await?;

        if pass.applied.is_empty() && !pass.failed.is_empty() {
            let (_, err) = pass.failed.swap_remove(0);
            return Err(err);
        }
        Ok(pass.applied)
    }

    pub async fn record(&self, prediction: NewPrediction) -> OracleResult<i64> {
        let _guard = self.guard.lock().await;
        self.store.insert(&prediction).await
    }

    /// Reconcile the previous pending row(s), then record `content` when present.
    ///
    /// A reconciliation failure is logged and never blocks the insert.
    pub async fn record_and_reconcile(
        &self,
        claim: PredictionClaim,
        observed_price: f64,
        content: Option<&str>,
    ) -> LedgerOutcome {
        let _guard = self.guard.lock().await;
        let mut outcome = LedgerOutcome::default();

        match self.reconcile_pending(observed_price).await {
            Ok(pass) => {
                outcome.reconcile_failed = !pass.failed.is_empty();
                outcome.reconciled = pass.applied;
            }
            Err(err) => {
                error!(error = %err, "Failed to check last prediction");
                outcome.reconcile_failed = true;
            }
        }

        let Some(content) = content else {
            debug!("nothing to record this cycle");
            return outcome;
        };

        let prediction = NewPrediction {
            content: content.to_lowercase(),
            direction: claim.direction,
            observed_price,
            predicted_price: claim.predicted_price,
        };

        match self.store.insert(&prediction).await {
            Ok(id) => {
                info!(id, direction = ?claim.direction, observed_price, "prediction recorded");
                outcome.inserted_id = Some(id);
            }
            Err(err) => {
                error!(error = %err, "Error inserting prediction");
                outcome.record_failed = true;
            }
        }

        outcome
    }

    /// Judge and persist each pending row. A failed update is logged and the
    /// pass moves on to the next row.
    async fn reconcile_pending(&self, current_price: f64) -> OracleResult<PendingPass> {
        let limit = match self.config.policy {
            ReconcilePolicy::Latest => 1,
            ReconcilePolicy::AllPending => usize::MAX,
        };

        let pending = self.store.latest_pending(limit).await?;
        let mut pass = PendingPass::default();

        for row in pending {
            let update = Reconciliation {
                id: row.id,
                rightness: judge_direction(row.direction, row.observed_price, current_price),
                price_rightness: row.predicted_price.map(|predicted| {
                    judge_price(predicted, current_price, self.config.tolerance_fraction)
                }),
                reconciled_price: current_price,
            };

            if let Err(err) = self.store.update_correctness(&update).await {
                warn!(id = update.id, error = %err, "Failed to update prediction correctness");
                pass.failed.push((update.id, err));
                continue;
            }
            info!(
                id = update.id,
                rightness = %update.rightness,
                price_rightness = ?update.price_rightness,
                issued = row.observed_price,
                current = current_price,
                "prediction reconciled"
            );
            pass.applied.push(update);
        }

        Ok(pass)
    }
}
