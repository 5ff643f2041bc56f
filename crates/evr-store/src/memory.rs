use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::selector::Selector;
use crate::traits::{KeyValue, StateIter, VersionedValue, WorldState, WriteBatch};

/// In-memory, `BTreeMap`-based world state.
///
/// Intended for tests, embedding, and the CLI's snapshot-backed state. Keys
/// iterate in lexicographic order. Every commit bumps a global version that is
/// stamped onto the keys it writes; transactions use those versions for
/// read-set validation.
pub struct MemoryWorldState {
    inner: RwLock<WorldInner>,
    open_cursors: Arc<AtomicUsize>,
}

#[derive(Default)]
struct WorldInner {
    entries: BTreeMap<String, VersionedValue>,
    version: u64,
}

/// On-disk snapshot layout.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u64,
    entries: BTreeMap<String, SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    value: String,
    version: u64,
}

impl MemoryWorldState {
    /// Create a new empty world state.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(WorldInner::default()),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Load a snapshot file written by [`Self::save`].
    ///
    /// A missing file yields an empty world state.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot; starting empty");
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let entries = snapshot
            .entries
            .into_iter()
            .map(|(key, entry)| {
                (
                    key,
                    VersionedValue {
                        value: entry.value.into_bytes(),
                        version: entry.version,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        debug!(
            path = %path.display(),
            keys = entries.len(),
            version = snapshot.version,
            "snapshot loaded"
        );
        Ok(Self {
            inner: RwLock::new(WorldInner {
                entries,
                version: snapshot.version,
            }),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Write the committed state to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let snapshot = {
            let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
            let entries = inner
                .entries
                .iter()
                .map(|(key, v)| {
                    let value = String::from_utf8(v.value.clone()).map_err(|_| {
                        StoreError::Serialization(format!("value of '{key}' is not UTF-8"))
                    })?;
                    Ok((
                        key.clone(),
                        SnapshotEntry {
                            value,
                            version: v.version,
                        },
                    ))
                })
                .collect::<StoreResult<BTreeMap<_, _>>>()?;
            Snapshot {
                version: inner.version,
                entries,
            }
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), keys = snapshot.entries.len(), "snapshot saved");
        Ok(())
    }

    /// Number of committed keys.
    pub fn len(&self) -> StoreResult<usize> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.entries.len())
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Version of the most recent commit (0 before the first).
    pub fn version(&self) -> StoreResult<u64> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.version)
    }

    /// Number of cursors handed out by `scan`/`select` and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn cursor(&self, items: Vec<KeyValue>) -> StateIter<'static> {
        Box::new(Cursor::new(items, Arc::clone(&self.open_cursors)))
    }
}

impl Default for MemoryWorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState for MemoryWorldState {
    fn read(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.entries.get(key).cloned())
    }

    fn scan(&self, start: &str, end: &str) -> StoreResult<StateIter<'_>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        // BTreeMap::range panics on inverted bounds; an inverted range is empty.
        let items = if !end.is_empty() && start >= end {
            Vec::new()
        } else {
            let upper = if end.is_empty() {
                Bound::Unbounded
            } else {
                Bound::Excluded(end)
            };
            inner
                .entries
                .range::<str, _>((Bound::Included(start), upper))
                .map(|(k, v)| KeyValue::new(k.clone(), v.value.clone()))
                .collect()
        };
        Ok(self.cursor(items))
    }

    fn select(&self, query: &str) -> StoreResult<StateIter<'_>> {
        let selector = Selector::parse(query)?;
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let matched = inner
            .entries
            .iter()
            .filter(|(_, v)| selector.matches(&v.value))
            .skip(selector.skip())
            .take(selector.limit().unwrap_or(usize::MAX))
            .map(|(k, v)| KeyValue::new(k.clone(), v.value.clone()))
            .collect();
        Ok(self.cursor(matched))
    }

    fn apply(&self, batch: &WriteBatch) -> StoreResult<u64> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;

        for (key, observed) in &batch.reads {
            let current = inner.entries.get(key).map(|v| v.version);
            if current != *observed {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    observed: *observed,
                    current,
                });
            }
        }

        if batch.writes.is_empty() {
            return Ok(inner.version);
        }

        inner.version += 1;
        let version = inner.version;
        for (key, value) in &batch.writes {
            inner.entries.insert(
                key.clone(),
                VersionedValue {
                    value: value.clone(),
                    version,
                },
            );
        }
        debug!(version, writes = batch.writes.len(), "batch applied");
        Ok(version)
    }
}

impl std::fmt::Debug for MemoryWorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("MemoryWorldState");
        match self.inner.read() {
            Ok(inner) => s
                .field("key_count", &inner.entries.len())
                .field("version", &inner.version),
            Err(_) => s.field("poisoned", &true),
        };
        s.finish()
    }
}

/// Snapshot cursor that releases its slot in the open-cursor count on drop.
struct Cursor {
    items: std::vec::IntoIter<KeyValue>,
    open: Arc<AtomicUsize>,
}

impl Cursor {
    fn new(items: Vec<KeyValue>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            items: items.into_iter(),
            open,
        }
    }
}

impl Iterator for Cursor {
    type Item = StoreResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(Ok)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
