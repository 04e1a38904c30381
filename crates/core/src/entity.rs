//! Natural-key contract for recomputable output records.

use core::fmt::Debug;
use core::hash::Hash;

use crate::id::CompanyId;

/// An output record that is identified by a natural key rather than a
/// surrogate id.
///
/// Re-running a pipeline with identical inputs produces records with the same
/// keys; stores use the key to overwrite in place instead of appending.
pub trait NaturalKeyed {
    /// Composite natural key (e.g. company, warehouse, product, version).
    type Key: Clone + Eq + Ord + Hash + Debug + Send + Sync;

    /// The company partition the record belongs to.
    fn company_id(&self) -> CompanyId;

    /// Returns the record's natural key.
    fn natural_key(&self) -> Self::Key;
}
