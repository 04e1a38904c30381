//! Upsert-by-natural-key storage for pipeline outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use insight_core::{CompanyId, NaturalKeyed};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The batch itself is inconsistent (e.g. two records share a key).
    #[error("persistence conflict: {0}")]
    Conflict(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// A stored record with the time its current values were written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<R> {
    #[serde(flatten)]
    pub record: R,
    pub generated_at: DateTime<Utc>,
}

/// Company-partitioned store keyed by each record's natural key.
///
/// `upsert_batch` is all-or-nothing: on error no record of the batch is
/// written. Re-upserting a key overwrites the stored values and refreshes
/// `generated_at`.
pub trait RecordStore<R: NaturalKeyed>: Send + Sync {
    /// Returns the number of records written.
    fn upsert_batch(&self, records: Vec<R>) -> Result<usize, PersistError>;

    /// All records of one company, in natural-key order.
    fn list(&self, company_id: CompanyId) -> Result<Vec<Stored<R>>, PersistError>;
}

impl<R, S> RecordStore<R> for Arc<S>
where
    R: NaturalKeyed,
    S: RecordStore<R> + ?Sized,
{
    fn upsert_batch(&self, records: Vec<R>) -> Result<usize, PersistError> {
        (**self).upsert_batch(records)
    }

    fn list(&self, company_id: CompanyId) -> Result<Vec<Stored<R>>, PersistError> {
        (**self).list(company_id)
    }
}

/// In-memory record store for tests/dev and single-process deployments.
#[derive(Debug)]
pub struct InMemoryRecordStore<R: NaturalKeyed> {
    inner: RwLock<BTreeMap<R::Key, Stored<R>>>,
}

impl<R: NaturalKeyed> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: NaturalKeyed> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RecordStore<R> for InMemoryRecordStore<R>
where
    R: NaturalKeyed + Clone + Send + Sync,
{
    fn upsert_batch(&self, records: Vec<R>) -> Result<usize, PersistError> {
        let mut seen = BTreeSet::new();
        for r in &records {
            let key = r.natural_key();
            if !seen.insert(key.clone()) {
                return Err(PersistError::Conflict(format!(
                    "duplicate natural key in batch: {key:?}"
                )));
            }
        }

        let generated_at = Utc::now();
        let written = records.len();
        let mut map = self.inner.write().map_err(poisoned)?;
        for record in records {
            map.insert(record.natural_key(), Stored { record, generated_at });
        }
        Ok(written)
    }

    fn list(&self, company_id: CompanyId) -> Result<Vec<Stored<R>>, PersistError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map
            .values()
            .filter(|s| s.record.company_id() == company_id)
            .cloned()
            .collect())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> PersistError {
    PersistError::Unavailable("record store lock poisoned".to_string())
}
