//! Store trait: the abstract interface for ledger persistence.
//!
//! This trait keeps the accountant storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use accountant_core::{EntryId, EntryPayload, LedgerEntry, ModelRef, Signature};
use async_trait::async_trait;

use crate::error::Result;

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Serialized writes**: inserts and pruning never interleave, so two
///   inserts never share an id and a pruned window is never half-written.
/// - **Monotonic ids**: ids only grow and are never handed out twice, even
///   after the entries holding them are pruned.
/// - **Complete reads**: readers only ever see fully stored entries.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Entry Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a signed payload as a new entry.
    ///
    /// Assigns the next id and stamps both timestamps with `at` (Unix ms).
    async fn insert_entry(
        &self,
        payload: &EntryPayload,
        signature: &Signature,
        at: i64,
    ) -> Result<LedgerEntry>;

    /// Get an entry by id.
    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>>;

    /// All entries of a recordable, ascending by id.
    async fn entries_oldest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>>;

    /// All entries of a recordable, descending by id.
    async fn entries_newest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>>;

    /// Number of entries held for a recordable.
    async fn count(&self, recordable: &ModelRef) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Retention
    // ─────────────────────────────────────────────────────────────────────────

    /// Keep only the `threshold` most recent entries of a recordable.
    ///
    /// A threshold of 0 keeps everything. Returns how many entries were removed.
    async fn prune(&self, recordable: &ModelRef, threshold: usize) -> Result<usize>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn insert_entry(
        &self,
        payload: &EntryPayload,
        signature: &Signature,
        at: i64,
    ) -> Result<LedgerEntry> {
        (**self).insert_entry(payload, signature, at).await
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        (**self).get_entry(id).await
    }

    async fn entries_oldest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        (**self).entries_oldest_first(recordable).await
    }

    async fn entries_newest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        (**self).entries_newest_first(recordable).await
    }

    async fn count(&self, recordable: &ModelRef) -> Result<usize> {
        (**self).count(recordable).await
    }

    async fn prune(&self, recordable: &ModelRef, threshold: usize) -> Result<usize> {
        (**self).prune(recordable, threshold).await
    }
}
