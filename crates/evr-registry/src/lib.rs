//! Event registry over a transactional ledger store.
//!
//! Events are opaque payloads registered once under caller-chosen keys. The
//! registry enforces key uniqueness, stages multi-key cascading updates, and
//! assembles responses for point, batch, rich and range queries. It keeps no
//! state of its own: each call runs against one [`evr_store::LedgerStub`]
//! transaction, and atomicity comes from committing or dropping that
//! transaction as a whole.
//!
//! # Modules
//!
//! - [`registry`] -- [`EventRegistry`], the write and read paths
//! - [`dispatch`] -- [`Dispatcher`], the operation-name → handler table and
//!   the commit-or-rollback wrapper around each invocation
//! - [`types`] -- [`Operation`] names, the ordered [`KeyList`] and the
//!   unordered [`UpdateMap`]
//! - [`response`] -- JSON-array and range-listing assembly
//! - [`config`] -- [`RegistryConfig`]
//! - [`error`] -- [`RegistryError`]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod response;
pub mod types;

pub use config::RegistryConfig;
pub use dispatch::{Dispatcher, Response};
pub use error::{RegistryError, Result};
pub use registry::EventRegistry;
pub use response::{JsonArrayBuilder, RangeListing};
pub use types::{KeyList, Operation, UpdateMap};
