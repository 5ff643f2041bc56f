//! Transactional world-state capability for the event registry.
//!
//! The registry never talks to a storage engine directly. It is written
//! against [`LedgerStub`], a transaction-scoped view offering four calls:
//! point read, point write, range iteration and rich-query iteration.
//!
//! # Layers
//!
//! - [`WorldState`] -- committed key-value state with versioned entries and an
//!   atomic, read-set-validating `apply`
//! - [`Transaction`] -- the unit of work; implements [`LedgerStub`], buffers
//!   writes, commits or rolls back as a whole
//! - [`MemoryWorldState`] -- `BTreeMap`-backed world state with JSON snapshot
//!   persistence, used by tests and the CLI
//! - [`Selector`] -- the JSON selector language understood by `select`
//!
//! # Design Rules
//!
//! 1. Nothing a transaction writes is visible before commit.
//! 2. A failed commit leaves the world state untouched.
//! 3. Commit fails if any key the transaction read has changed since.
//! 4. Cursors are released on drop; callers never close them by hand.
//! 5. The store never interprets payloads except to evaluate a selector.

pub mod error;
pub mod memory;
pub mod selector;
pub mod traits;
pub mod tx;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryWorldState;
pub use selector::Selector;
pub use traits::{KeyValue, LedgerStub, StateIter, VersionedValue, WorldState, WriteBatch};
pub use tx::Transaction;
