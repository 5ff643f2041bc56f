use std::collections::BTreeMap;

use crate::error::StoreResult;

/// A single `(key, value)` pair yielded by range and rich-query iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A committed value together with the version of the commit that wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// Boxed cursor over world-state entries.
///
/// Cursors are released when dropped, so every exit path out of a consuming
/// loop (completion, `?` on a failed item, early return) closes them.
pub type StateIter<'a> = Box<dyn Iterator<Item = StoreResult<KeyValue>> + 'a>;

/// Everything a transaction hands to the backend at commit time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// Keys read by the transaction and the version observed (`None` = absent).
    pub reads: BTreeMap<String, Option<u64>>,
    /// Keys written by the transaction and their new values.
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// Committed world state: the raw key-value engine underneath transactions.
///
/// Implementations must satisfy these invariants:
/// - `apply` is atomic: either every write of the batch becomes visible or none.
/// - `apply` validates the batch's read set against current versions under the
///   same critical section that installs the writes.
/// - Iteration order for `scan` and `select` is ascending key order.
pub trait WorldState: Send + Sync {
    /// Read the committed value and version for `key`.
    fn read(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Iterate committed entries with `start <= key < end`.
    ///
    /// An empty `end` leaves the range unbounded above.
    fn scan(&self, start: &str, end: &str) -> StoreResult<StateIter<'_>>;

    /// Iterate committed entries whose JSON payload matches `query`.
    fn select(&self, query: &str) -> StoreResult<StateIter<'_>>;

    /// Validate the read set and install the write set. Returns the commit version.
    fn apply(&self, batch: &WriteBatch) -> StoreResult<u64>;
}

/// The transaction-scoped ledger capability the registry is written against.
///
/// Every call is part of one unit of work: reads are recorded for conflict
/// validation and writes stay provisional until the owner commits.
pub trait LedgerStub {
    /// Read the committed value under `key`, or `None` when it is unregistered.
    /// Writes staged in the same unit of work are not visible.
    fn get_state(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stage `value` under `key`.
    fn put_state(&mut self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Iterate the committed range `[start, end)`.
    fn get_state_by_range(&self, start: &str, end: &str) -> StoreResult<StateIter<'_>>;

    /// Iterate committed records matching a rich-query expression.
    fn get_query_result(&self, query: &str) -> StoreResult<StateIter<'_>>;
}
