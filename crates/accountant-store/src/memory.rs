//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, nothing persisted. One `RwLock` guards all
//! state, so every mutation is serialized.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use accountant_core::{EntryId, EntryPayload, LedgerEntry, ModelRef, Signature};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Last id handed out. Never decreases.
    last_id: u64,

    /// Entries indexed by id.
    entries: BTreeMap<u64, LedgerEntry>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                last_id: 0,
                entries: BTreeMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn entries_of<'a>(
        &'a self,
        recordable: &'a ModelRef,
    ) -> impl DoubleEndedIterator<Item = &'a LedgerEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| entry.payload.recordable == *recordable)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_entry(
        &self,
        payload: &EntryPayload,
        signature: &Signature,
        at: i64,
    ) -> Result<LedgerEntry> {
        let mut inner = self.write()?;

        inner.last_id += 1;
        let id = EntryId::new(inner.last_id);
        let entry = LedgerEntry::new(id, payload.clone(), *signature, at);
        inner.entries.insert(id.get(), entry.clone());

        debug!(entry = %id, recordable = %payload.recordable, "inserted ledger entry");
        Ok(entry)
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.entries.get(&id.get()).cloned())
    }

    async fn entries_oldest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        Ok(self.read()?.entries_of(recordable).cloned().collect())
    }

    async fn entries_newest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        Ok(self.read()?.entries_of(recordable).rev().cloned().collect())
    }

    async fn count(&self, recordable: &ModelRef) -> Result<usize> {
        Ok(self.read()?.entries_of(recordable).count())
    }

    async fn prune(&self, recordable: &ModelRef, threshold: usize) -> Result<usize> {
        if threshold == 0 {
            return Ok(0);
        }

        let mut inner = self.write()?;
        let doomed: Vec<u64> = inner
            .entries_of(recordable)
            .rev()
            .skip(threshold)
            .map(|entry| entry.id.get())
            .collect();

        for id in &doomed {
            inner.entries.remove(id);
        }

        if !doomed.is_empty() {
            debug!(recordable = %recordable, removed = doomed.len(), threshold, "pruned ledger");
        }
        Ok(doomed.len())
    }
}
