//! Transactional unit of work over a [`WorldState`].
//!
//! A [`Transaction`] buffers every write and remembers the version of every
//! key it read. Nothing reaches the world state until [`Transaction::commit`]
//! hands the whole batch to [`WorldState::apply`], which validates the read set
//! and installs the writes atomically. Dropping a transaction without
//! committing discards its writes.
//!
//! Every read, point or iterated, observes committed state only. A key staged
//! by `put_state` stays invisible to this transaction's own `get_state` until
//! commit.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::StoreResult;
use crate::traits::{LedgerStub, StateIter, WorldState, WriteBatch};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// A single unit of work against a world state.
pub struct Transaction<'w, W: WorldState + ?Sized> {
    id: u64,
    world: &'w W,
    batch: WriteBatch,
    finished: bool,
}

impl<'w, W: WorldState + ?Sized> Transaction<'w, W> {
    /// Begin a transaction against `world`.
    pub fn begin(world: &'w W) -> Self {
        let id = NEXT_TX_ID.fetch_add(1, Ordering::Relaxed);
        debug!(tx = id, "transaction begun");
        Self {
            id,
            world,
            batch: WriteBatch::default(),
            finished: false,
        }
    }

    /// Process-unique transaction identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of keys staged for writing.
    pub fn pending_writes(&self) -> usize {
        self.batch.writes.len()
    }

    /// Keys read so far and the versions observed.
    pub fn read_set(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.batch.reads.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Validate and apply the buffered batch. Returns the commit version.
    ///
    /// On error nothing from this transaction is visible in the world state.
    pub fn commit(mut self) -> StoreResult<u64> {
        self.finished = true;
        let batch = std::mem::take(&mut self.batch);
        let version = self.world.apply(&batch)?;
        debug!(
            tx = self.id,
            version,
            reads = batch.reads.len(),
            writes = batch.writes.len(),
            "transaction committed"
        );
        Ok(version)
    }

    /// Discard every buffered write.
    pub fn rollback(self) {
        // Drop does the work.
    }
}

impl<W: WorldState + ?Sized> LedgerStub for Transaction<'_, W> {
    fn get_state(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let committed = self.world.read(key)?;
        self.batch
            .reads
            .entry(key.to_string())
            .or_insert_with(|| committed.as_ref().map(|v| v.version));
        Ok(committed.map(|v| v.value))
    }

    fn put_state(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.batch.writes.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_state_by_range(&self, start: &str, end: &str) -> StoreResult<StateIter<'_>> {
        self.world.scan(start, end)
    }

    fn get_query_result(&self, query: &str) -> StoreResult<StateIter<'_>> {
        self.world.select(query)
    }
}

impl<W: WorldState + ?Sized> Drop for Transaction<'_, W> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                tx = self.id,
                discarded = self.batch.writes.len(),
                "transaction rolled back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryWorldState;

    #[test]
    fn writes_are_invisible_until_commit() {
        let world = MemoryWorldState::new();
        let mut tx = Transaction::begin(&world);
        tx.put_state("a", b"1").unwrap();
        assert!(world.read("a").unwrap().is_none());
        assert_eq!(tx.pending_writes(), 1);

        tx.commit().unwrap();
        assert_eq!(world.read("a").unwrap().unwrap().value, b"1");
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let world = MemoryWorldState::new();
        {
            let mut tx = Transaction::begin(&world);
            tx.put_state("a", b"1").unwrap();
        }
        assert!(world.is_empty().unwrap());

        let mut tx = Transaction::begin(&world);
        tx.put_state("b", b"2").unwrap();
        tx.rollback();
        assert!(world.is_empty().unwrap());
    }

    #[test]
    fn reads_do_not_see_own_writes() {
        let world = MemoryWorldState::new();
        let mut seed = Transaction::begin(&world);
        seed.put_state("b", b"old").unwrap();
        seed.commit().unwrap();

        let mut tx = Transaction::begin(&world);
        tx.put_state("a", b"new").unwrap();
        tx.put_state("b", b"new").unwrap();
        assert_eq!(tx.get_state("a").unwrap(), None);
        assert_eq!(tx.get_state("b").unwrap().as_deref(), Some(&b"old"[..]));

        let reads: Vec<_> = tx.read_set().collect();
        assert_eq!(reads, [("a", None), ("b", Some(1))]);
        tx.commit().unwrap();
        assert_eq!(world.read("b").unwrap().unwrap().value, b"new");
    }

    #[test]
    fn read_set_records_first_observation() {
        let world = MemoryWorldState::new();
        let mut seed = Transaction::begin(&world);
        seed.put_state("a", b"1").unwrap();
        seed.commit().unwrap();

        let mut tx = Transaction::begin(&world);
        tx.get_state("a").unwrap();
        tx.get_state("b").unwrap();
        let reads: Vec<_> = tx.read_set().collect();
        assert_eq!(reads, [("a", Some(1)), ("b", None)]);
    }

    #[test]
    fn concurrent_check_then_write_conflicts() {
        let world = MemoryWorldState::new();

        let mut first = Transaction::begin(&world);
        let mut second = Transaction::begin(&world);
        assert!(first.get_state("k").unwrap().is_none());
        assert!(second.get_state("k").unwrap().is_none());
        first.put_state("k", b"first").unwrap();
        second.put_state("k", b"second").unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref key, .. } if key == "k"));
        assert_eq!(world.read("k").unwrap().unwrap().value, b"first");
    }

    #[test]
    fn range_reads_committed_state_only() {
        let world = MemoryWorldState::new();
        let mut tx = Transaction::begin(&world);
        tx.put_state("a", b"1").unwrap();
        assert_eq!(tx.get_state_by_range("", "").unwrap().count(), 0);
    }

    #[test]
    fn transaction_ids_are_unique() {
        let world = MemoryWorldState::new();
        let a = Transaction::begin(&world);
        let b = Transaction::begin(&world);
        assert_ne!(a.id(), b.id());
    }
}
