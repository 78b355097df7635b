//! # Accountant
//!
//! The unified API for tamper-evident entity ledgers: every lifecycle
//! event of a tracked entity becomes a signed snapshot that can later be
//! checked, extracted, and replayed against the live state.
//!
//! ## Overview
//!
//! - **Recording**: snapshots are ciphered, signed and appended through a
//!   single write path that also applies retention pruning
//! - **Entries**: a stored entry can be checked for tampering, compiled for
//!   display, or extracted back into the original attributes
//! - **Replay**: the full history of an entity can be folded and compared
//!   with its current attributes
//!
//! ## Key Concepts
//!
//! - **Recordable**: an entity that opts into ledgers
//! - **Cipher**: a per-field transformation applied before signing
//! - **Notary**: signs the canonical form of a payload
//! - **Taint**: a stored entry that no longer matches its signature
//!
//! ## Usage
//!
//! ```rust,no_run
//! use accountant::{Accountant, AccountantConfig, RecordContext};
//! use accountant::core::Recordable;
//!
//! async fn example(article: &dyn Recordable) {
//!     let accountant = Accountant::open(AccountantConfig::default()).unwrap();
//!
//!     accountant
//!         .record(article, "created", &RecordContext::new())
//!         .await
//!         .unwrap();
//!
//!     let reachable = accountant.is_current_state_reachable(article).await.unwrap();
//!     assert!(reachable);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `accountant::core` - Ciphers, notaries, entries and replay
//! - `accountant::store` - Storage abstraction, SQLite and in-memory stores

pub mod accountant;
pub mod config;
pub mod driver;
pub mod error;

// Re-export component crates
pub use accountant_core as core;
pub use accountant_store as store;

// Re-export main types for convenience
pub use crate::accountant::{Accountant, RecordContext};
pub use config::AccountantConfig;
pub use driver::open_store;
pub use error::{AccountantError, Result};

// Re-export commonly used core types
pub use accountant_core::{
    Attribute, Cipher, CipherRegistry, Compiled, EntryId, EntryPayload, Identifiable,
    LedgerEntry, LedgerError, ModelRef, Notary, NotaryRegistry, Properties, Recordable,
    RequestContext, Verdict,
};
