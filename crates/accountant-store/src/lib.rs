//! # Accountant Store
//!
//! Storage abstraction for the accountant ledger. Provides a trait-based
//! interface for ledger persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts entry storage behind the [`Store`] trait,
//! allowing the accountant to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for tests and ephemeral use.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage
//!
//! ## Usage
//!
//! ```rust,no_run
//! use accountant_core::{CipherRegistry, EntryPayload, ModelRef, Notary, Sha512Notary, Signable};
//! use accountant_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!
//!     let payload = EntryPayload::builder("created", ModelRef::new("article", 1))
//!         .build(&CipherRegistry::new())
//!         .unwrap();
//!     let signature = Sha512Notary.sign(&payload.signable());
//!     let entry = store.insert_entry(&payload, &signature, 0).await.unwrap();
//!
//!     store.prune(&entry.payload.recordable, 10).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append only**: entries are inserted and pruned, never updated
//! - **Retired ids**: pruning never frees an id for reuse
//! - **Per-recordable windows**: pruning one entity never touches another

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
