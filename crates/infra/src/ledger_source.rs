//! Shared, swappable ledger snapshot.

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use insight_ledger::{LedgerError, LedgerSnapshot};

#[derive(Debug, Error)]
pub enum LedgerSourceError {
    #[error("failed to read ledger file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("ledger source unavailable: lock poisoned")]
    Poisoned,
}

/// Holds the current snapshot; readers get a cheap `Arc` clone and are not
/// affected by a concurrent replace.
#[derive(Debug, Default)]
pub struct LedgerSource {
    current: RwLock<Arc<LedgerSnapshot>>,
}

impl LedgerSource {
    pub fn new(snapshot: LedgerSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, LedgerSourceError> {
        let raw = fs::read_to_string(path).map_err(|source| LedgerSourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot = LedgerSnapshot::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            sales = snapshot.sales.len(),
            purchases = snapshot.purchases.len(),
            expenses = snapshot.expenses.len(),
            payments = snapshot.payments.len(),
            movements = snapshot.movements.len(),
            "ledger snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> Result<Arc<LedgerSnapshot>, LedgerSourceError> {
        self.current
            .read()
            .map(|s| Arc::clone(&s))
            .map_err(|_| LedgerSourceError::Poisoned)
    }

    /// Validates and swaps in a new snapshot; the old one stays in place on error.
    pub fn replace(&self, snapshot: LedgerSnapshot) -> Result<(), LedgerSourceError> {
        snapshot.validate()?;
        let mut current = self.current.write().map_err(|_| LedgerSourceError::Poisoned)?;
        *current = Arc::new(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use insight_core::{CompanyId, WarehouseId};
    use insight_ledger::ExpenseLine;

    use super::*;

    fn expense(amount: f64) -> ExpenseLine {
        ExpenseLine {
            company_id: CompanyId::new(1),
            warehouse_id: WarehouseId::new(5),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            approved: true,
            amount,
        }
    }

    #[test]
    fn replace_swaps_snapshot_without_touching_held_readers() {
        let source = LedgerSource::default();
        let before = source.snapshot().unwrap();

        source
            .replace(LedgerSnapshot {
                expenses: vec![expense(10.0)],
                ..LedgerSnapshot::default()
            })
            .unwrap();

        assert!(before.expenses.is_empty());
        assert_eq!(source.snapshot().unwrap().expenses.len(), 1);
    }

    #[test]
    fn invalid_snapshot_is_rejected_and_previous_kept() {
        let source = LedgerSource::new(LedgerSnapshot {
            expenses: vec![expense(10.0)],
            ..LedgerSnapshot::default()
        });

        let err = source
            .replace(LedgerSnapshot {
                expenses: vec![expense(f64::NAN)],
                ..LedgerSnapshot::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerSourceError::Ledger(_)));
        assert_eq!(source.snapshot().unwrap().expenses[0].amount, 10.0);
    }

    #[test]
    fn loads_snapshot_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"{ "expenses": [ { "company_id": 1, "warehouse_id": 5, "date": "2024-01-01",
                                  "approved": true, "amount": 12.5 } ] }"#,
        )
        .unwrap();

        let source = LedgerSource::from_file(&path).unwrap();
        assert_eq!(source.snapshot().unwrap().expenses[0].amount, 12.5);

        let missing = LedgerSource::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, LedgerSourceError::Io { .. }));
    }
}
