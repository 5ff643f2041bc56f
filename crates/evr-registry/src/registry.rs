use evr_store::LedgerStub;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::response::{JsonArrayBuilder, RangeListing};
use crate::types::{KeyList, Operation, UpdateMap};

/// The event registry.
///
/// Stateless between calls: every operation reads and writes only through
/// the [`LedgerStub`] it is handed, which scopes the call to one transaction.
/// The registry never undoes its own writes; when an operation fails, the
/// caller drops the transaction and every staged write goes with it.
#[derive(Clone, Debug, Default)]
pub struct EventRegistry {
    config: RegistryConfig,
}

impl EventRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Deployment-time hook. The registry keeps no state, so there is
    /// nothing to set up.
    pub fn init(&self) -> Result<()> {
        traced(Operation::Init.as_str(), "", || Ok(()))
    }

    // -----------------------------------------------------------------------
    // Write paths
    // -----------------------------------------------------------------------

    /// Register `payload` under a key that has never been written.
    pub fn register<S: LedgerStub + ?Sized>(
        &self,
        stub: &mut S,
        key: &str,
        payload: &str,
    ) -> Result<()> {
        const OP: &str = "Register";
        traced(OP, key, || {
            self.check_key(OP, key)?;
            ensure_absent(stub, OP, key)?;
            put(stub, OP, key, payload)
        })
    }

    /// Register `payload` under a new key, then overwrite each already
    /// registered key named in `updates` (a JSON object of key to payload).
    ///
    /// Steps run strictly in order and stop at the first failure: the new key
    /// is checked and staged before `updates` is even parsed.
    pub fn register_with_update<S: LedgerStub + ?Sized>(
        &self,
        stub: &mut S,
        key: &str,
        payload: &str,
        updates: &str,
    ) -> Result<()> {
        const OP: &str = "RegisterWithUpdate";
        traced(OP, key, || {
            self.check_key(OP, key)?;
            ensure_absent(stub, OP, key)?;
            put(stub, OP, key, payload)?;

            let updates = UpdateMap::parse(OP, updates)?;
            for (target, replacement) in updates.iter() {
                if get(stub, OP, target)?.is_none() {
                    return Err(RegistryError::NotFound {
                        op: OP,
                        key: target.to_string(),
                    });
                }
                put(stub, OP, target, replacement)?;
            }
            debug!(op = OP, key, updated = updates.len(), "cascading update staged");
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Read paths
    // -----------------------------------------------------------------------

    /// Whether `key` holds a record.
    pub fn exists<S: LedgerStub + ?Sized>(&self, stub: &mut S, key: &str) -> Result<bool> {
        const OP: &str = "Exists";
        traced(OP, key, || {
            self.check_key(OP, key)?;
            Ok(get(stub, OP, key)?.is_some())
        })
    }

    /// The record stored under `key`.
    pub fn query<S: LedgerStub + ?Sized>(&self, stub: &mut S, key: &str) -> Result<String> {
        const OP: &str = "Query";
        traced(OP, key, || {
            self.check_key(OP, key)?;
            match get(stub, OP, key)? {
                Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                None => Err(RegistryError::NotFound {
                    op: OP,
                    key: key.to_string(),
                }),
            }
        })
    }

    /// The records stored under every key of a JSON array, in array order.
    ///
    /// All or nothing: the first missing key fails the whole call.
    pub fn query_by_keys<S: LedgerStub + ?Sized>(
        &self,
        stub: &mut S,
        keys: &str,
    ) -> Result<String> {
        const OP: &str = "QueryByKeys";
        traced(OP, keys, || {
            let keys = KeyList::parse(OP, keys)?;
            if keys.is_empty() {
                return Err(RegistryError::EmptyInput {
                    op: OP,
                    arg: "key array",
                });
            }
            if let Some(max) = self.config.max_query_keys {
                if keys.len() > max {
                    return Err(RegistryError::MalformedInput {
                        op: OP,
                        arg: "key array",
                        reason: format!("{} keys exceeds the limit of {max}", keys.len()),
                    });
                }
            }

            let mut response = JsonArrayBuilder::new();
            for key in keys.iter() {
                match get(stub, OP, key)? {
                    Some(bytes) => response.push(&bytes),
                    None => {
                        return Err(RegistryError::NotFound {
                            op: OP,
                            key: key.to_string(),
                        })
                    }
                }
            }
            Ok(response.finish())
        })
    }

    /// The records matching a rich-query expression, in store order.
    ///
    /// An iteration failure discards everything gathered so far.
    pub fn query_by_predicate<S: LedgerStub + ?Sized>(
        &self,
        stub: &mut S,
        query: &str,
    ) -> Result<String> {
        const OP: &str = "QueryByPredicate";
        traced(OP, query, || {
            let results = stub
                .get_query_result(query)
                .map_err(|e| RegistryError::store(OP, "get_query_result", query, e))?;

            let mut response = JsonArrayBuilder::new();
            for item in results {
                let record = item.map_err(|e| RegistryError::store(OP, "next", query, e))?;
                response.push(&record.value);
            }
            debug!(op = OP, matched = response.len(), "rich query assembled");
            Ok(response.finish())
        })
    }

    /// Plain-text `'<key>' = <value>` listing of `[start, end)`.
    ///
    /// Meant for inspecting the ledger by hand, not for programmatic use.
    pub fn query_by_range<S: LedgerStub + ?Sized>(
        &self,
        stub: &mut S,
        start: &str,
        end: &str,
    ) -> Result<String> {
        const OP: &str = "QueryByRange";
        let span = format!("{start}..{end}");
        traced(OP, &span, || {
            let results = stub
                .get_state_by_range(start, end)
                .map_err(|e| RegistryError::store(OP, "get_state_by_range", span.as_str(), e))?;

            let mut listing = RangeListing::new();
            for item in results {
                let record = item.map_err(|e| RegistryError::store(OP, "next", span.as_str(), e))?;
                listing.push(&record.key, &record.value);
            }
            Ok(listing.finish())
        })
    }

    fn check_key(&self, op: &'static str, key: &str) -> Result<()> {
        if self.config.reject_empty_keys && key.is_empty() {
            return Err(RegistryError::EmptyInput { op, arg: "key" });
        }
        Ok(())
    }
}

/// Log entry, successful exit, and failure around one registry call.
fn traced<T>(op: &'static str, arg: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
    debug!(op, arg, "called");
    let result = body();
    match &result {
        Ok(_) => debug!(op, arg, "end"),
        Err(e) => warn!(op, arg, error = %e, "failed"),
    }
    result
}

fn get<S: LedgerStub + ?Sized>(
    stub: &mut S,
    op: &'static str,
    key: &str,
) -> Result<Option<Vec<u8>>> {
    stub.get_state(key).map_err(|e| RegistryError::store(op, "get_state", key, e))
}

fn put<S: LedgerStub + ?Sized>(
    stub: &mut S,
    op: &'static str,
    key: &str,
    payload: &str,
) -> Result<()> {
    stub.put_state(key, payload.as_bytes())
        .map_err(|e| RegistryError::store(op, "put_state", key, e))
}

fn ensure_absent<S: LedgerStub + ?Sized>(
    stub: &mut S,
    op: &'static str,
    key: &str,
) -> Result<()> {
    if get(stub, op, key)?.is_some() {
        return Err(RegistryError::AlreadyExists {
            op,
            key: key.to_string(),
        });
    }
    Ok(())
}
