// Budget Tracker
// Two-phase (reserve -> commit | release) USD ledger consulted before every
// paid provider call. One instance per process, shared as a handle.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use showreel_types::{ProductionError, ProductionResult};

// Floating-point slack so reserving exactly `remaining()` succeeds.
const BALANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Commit,
    Release,
}

/// Append-only ledger row. Commits are the only debits; releases record
/// holds that were returned without spending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LedgerEntryKind,
    pub category: String,
    pub amount_usd: f64,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedLedger {
    run_id: String,
    total_usd: f64,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone)]
struct Reservation {
    run_id: String,
    pilot_id: Option<String>,
    category: String,
    amount_usd: f64,
}

#[derive(Debug)]
struct RunLedger {
    total_usd: f64,
    entries: Vec<LedgerEntry>,
    persist_path: Option<PathBuf>,
}

impl RunLedger {
    fn committed(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.kind == LedgerEntryKind::Commit)
            .map(|e| e.amount_usd)
            .sum()
    }
}

#[derive(Default)]
struct Inner {
    runs: HashMap<String, RunLedger>,
    reservations: HashMap<String, Reservation>,
}

impl Inner {
    fn reserved_for(&self, run_id: &str) -> f64 {
        self.reservations
            .values()
            .filter(|r| r.run_id == run_id)
            .map(|r| r.amount_usd)
            .sum()
    }
}

/// Process-wide budget tracker. All balance mutations happen under one lock
/// so `sum(committed) + sum(reserved) <= total` holds across tasks.
pub struct BudgetTracker {
    inner: Mutex<Inner>,
}

impl BudgetTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a run's allocation. A second call for the same run id is a
    /// no-op so resumed runs keep their loaded ledger.
    pub async fn open_run(&self, run_id: &str, total_usd: f64) {
        let mut inner = self.inner.lock().await;
        inner.runs.entry(run_id.to_string()).or_insert(RunLedger {
            total_usd,
            entries: Vec::new(),
            persist_path: None,
        });
    }

    /// Register a run whose ledger persists at `path`. Existing entries are
    /// loaded so a resumed run never re-debits committed costs.
    pub async fn open_run_persisted(
        &self,
        run_id: &str,
        total_usd: f64,
        path: PathBuf,
    ) -> ProductionResult<()> {
        let mut entries = Vec::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .await
                .map_err(|e| ProductionError::JournalIo(format!("ledger read: {e}")))?;
            let persisted: PersistedLedger = serde_json::from_str(&raw)
                .map_err(|e| ProductionError::JournalIo(format!("ledger parse: {e}")))?;
            entries = persisted.entries;
        }

        let mut inner = self.inner.lock().await;
        inner.runs.insert(
            run_id.to_string(),
            RunLedger {
                total_usd,
                entries,
                persist_path: Some(path),
            },
        );
        Ok(())
    }

    /// Place a hold against the run's balance. Fails `OVER_BUDGET` when the
    /// hold would push committed + reserved past the allocation.
    pub async fn reserve(
        &self,
        run_id: &str,
        pilot_id: Option<&str>,
        category: &str,
        amount_usd: f64,
    ) -> ProductionResult<String> {
        if amount_usd < 0.0 || !amount_usd.is_finite() {
            return Err(ProductionError::InputInvalid(format!(
                "reservation amount must be a non-negative number, got {amount_usd}"
            )));
        }

        let mut inner = self.inner.lock().await;
        let reserved = inner.reserved_for(run_id);
        let ledger = inner
            .runs
            .get(run_id)
            .ok_or_else(|| ProductionError::InputInvalid(format!("unknown run `{run_id}`")))?;

        let remaining = ledger.total_usd - ledger.committed() - reserved;
        if amount_usd > remaining + BALANCE_EPSILON {
            return Err(ProductionError::OverBudget {
                requested: amount_usd,
                remaining: remaining.max(0.0),
            });
        }

        let reservation_id = format!("rsv_{}", Uuid::new_v4().simple());
        inner.reservations.insert(
            reservation_id.clone(),
            Reservation {
                run_id: run_id.to_string(),
                pilot_id: pilot_id.map(str::to_string),
                category: category.to_string(),
                amount_usd,
            },
        );
        tracing::debug!(run_id, category, amount_usd, reservation_id = %reservation_id, "reserved budget");
        Ok(reservation_id)
    }

    /// Settle a hold with the actual amount spent. A zero-cost commit (mock
    /// providers) drops the hold without recording a debit.
    pub async fn commit(
        &self,
        reservation_id: &str,
        actual_usd: f64,
        asset_id: Option<&str>,
    ) -> ProductionResult<()> {
        let mut inner = self.inner.lock().await;
        let reservation = inner.reservations.remove(reservation_id).ok_or_else(|| {
            ProductionError::InputInvalid(format!("unknown reservation `{reservation_id}`"))
        })?;

        if actual_usd > reservation.amount_usd + BALANCE_EPSILON {
            tracing::warn!(
                reservation_id,
                reserved = reservation.amount_usd,
                actual = actual_usd,
                "provider charged more than reserved"
            );
        }

        if actual_usd > 0.0 {
            let entry = LedgerEntry {
                timestamp: Utc::now(),
                kind: LedgerEntryKind::Commit,
                category: reservation.category.clone(),
                amount_usd: actual_usd,
                run_id: reservation.run_id.clone(),
                pilot_id: reservation.pilot_id.clone(),
                asset_id: asset_id.map(str::to_string),
            };
            Self::append_and_flush(&mut inner, &reservation.run_id, entry).await?;
        }
        Ok(())
    }

    /// Return a hold unspent. The release is recorded for audit but is not a
    /// debit.
    pub async fn release(&self, reservation_id: &str) -> ProductionResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(reservation) = inner.reservations.remove(reservation_id) else {
            // Releasing twice (e.g. cancel racing a failure path) is harmless.
            return Ok(());
        };
        let entry = LedgerEntry {
            timestamp: Utc::now(),
            kind: LedgerEntryKind::Release,
            category: reservation.category.clone(),
            amount_usd: reservation.amount_usd,
            run_id: reservation.run_id.clone(),
            pilot_id: reservation.pilot_id.clone(),
            asset_id: None,
        };
        Self::append_and_flush(&mut inner, &reservation.run_id, entry).await
    }

    pub async fn remaining(&self, run_id: &str) -> f64 {
        let inner = self.inner.lock().await;
        let reserved = inner.reserved_for(run_id);
        inner
            .runs
            .get(run_id)
            .map(|l| (l.total_usd - l.committed() - reserved).max(0.0))
            .unwrap_or(0.0)
    }

    /// Sum of committed debits for the run.
    pub async fn committed(&self, run_id: &str) -> f64 {
        let inner = self.inner.lock().await;
        inner.runs.get(run_id).map(|l| l.committed()).unwrap_or(0.0)
    }

    pub async fn entries(&self, run_id: &str) -> Vec<LedgerEntry> {
        let inner = self.inner.lock().await;
        inner
            .runs
            .get(run_id)
            .map(|l| l.entries.clone())
            .unwrap_or_default()
    }

    async fn append_and_flush(
        inner: &mut Inner,
        run_id: &str,
        entry: LedgerEntry,
    ) -> ProductionResult<()> {
        let ledger = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| ProductionError::InputInvalid(format!("unknown run `{run_id}`")))?;
        ledger.entries.push(entry);

        if let Some(path) = ledger.persist_path.clone() {
            let persisted = PersistedLedger {
                run_id: run_id.to_string(),
                total_usd: ledger.total_usd,
                entries: ledger.entries.clone(),
            };
            let raw = serde_json::to_string_pretty(&persisted)
                .map_err(|e| ProductionError::JournalIo(format!("ledger encode: {e}")))?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ProductionError::JournalIo(format!("ledger dir: {e}")))?;
            }
            fs::write(&path, raw)
                .await
                .map_err(|e| ProductionError::JournalIo(format!("ledger write: {e}")))?;
            let file = fs::File::open(&path)
                .await
                .map_err(|e| ProductionError::JournalIo(format!("ledger reopen: {e}")))?;
            file.sync_all()
                .await
                .map_err(|e| ProductionError::JournalIo(format!("ledger fsync: {e}")))?;
        }
        Ok(())
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_exactly_remaining_succeeds() {
        let tracker = BudgetTracker::new();
        tracker.open_run("run-1", 2.0).await;

        let first = tracker
            .reserve("run-1", None, "video", 1.5)
            .await
            .expect("first hold");
        tracker.commit(&first, 1.5, Some("asset-1")).await.unwrap();

        let remaining = tracker.remaining("run-1").await;
        assert!((remaining - 0.5).abs() < 1e-9);

        tracker
            .reserve("run-1", None, "video", remaining)
            .await
            .expect("reserving exactly the remainder");
    }

    #[tokio::test]
    async fn reserve_past_remaining_fails_over_budget() {
        let tracker = BudgetTracker::new();
        tracker.open_run("run-1", 1.0).await;
        let err = tracker
            .reserve("run-1", None, "video", 1.01)
            .await
            .err()
            .expect("over budget");
        assert!(matches!(err, ProductionError::OverBudget { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn release_returns_the_hold() {
        let tracker = BudgetTracker::new();
        tracker.open_run("run-1", 1.0).await;
        let hold = tracker.reserve("run-1", None, "audio", 0.8).await.unwrap();
        assert!(tracker.reserve("run-1", None, "audio", 0.5).await.is_err());
        tracker.release(&hold).await.unwrap();
        assert!((tracker.remaining("run-1").await - 1.0).abs() < 1e-9);

        let entries = tracker.entries("run-1").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LedgerEntryKind::Release);
    }

    #[tokio::test]
    async fn zero_cost_commit_records_no_debit() {
        let tracker = BudgetTracker::new();
        tracker.open_run("run-1", 1.0).await;
        let hold = tracker.reserve("run-1", None, "video", 0.4).await.unwrap();
        tracker.commit(&hold, 0.0, Some("mock-asset")).await.unwrap();
        assert_eq!(tracker.committed("run-1").await, 0.0);
        assert!(tracker.entries("run-1").await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_reservations_never_overshoot() {
        let tracker = std::sync::Arc::new(BudgetTracker::new());
        tracker.open_run("run-1", 1.0).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.reserve("run-1", None, "video", 0.3).await.is_ok()
            }));
        }
        let granted = futures_count(handles).await;
        assert_eq!(granted, 3);
    }

    async fn futures_count(handles: Vec<tokio::task::JoinHandle<bool>>) -> usize {
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        granted
    }

    #[tokio::test]
    async fn persisted_ledger_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let tracker = BudgetTracker::new();
        tracker
            .open_run_persisted("run-1", 5.0, path.clone())
            .await
            .unwrap();
        let hold = tracker.reserve("run-1", None, "video", 2.0).await.unwrap();
        tracker.commit(&hold, 2.0, Some("asset-1")).await.unwrap();

        // A fresh tracker (new process) sees the committed spend.
        let reloaded = BudgetTracker::new();
        reloaded
            .open_run_persisted("run-1", 5.0, path)
            .await
            .unwrap();
        assert!((reloaded.committed("run-1").await - 2.0).abs() < 1e-9);
        assert!((reloaded.remaining("run-1").await - 3.0).abs() < 1e-9);
    }
}
