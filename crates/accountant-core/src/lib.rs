//! # Accountant Core
//!
//! Pure primitives for the Accountant ledger: ciphers, canonical signing,
//! ledger entries and history replay.
//!
//! This crate contains no I/O and no storage. Entries come in, verdicts and
//! attribute maps come out.
//!
//! ## Key Types
//!
//! - [`LedgerEntry`] - One signed snapshot of an entity at a lifecycle event
//! - [`EntryPayload`] - The signed part of an entry
//! - [`Cipher`] - Field transformation applied before signing
//! - [`Notary`] - Signs canonical payloads
//! - [`Verdict`] - Outcome of replaying a history against live state
//!
//! ## Canonicalization
//!
//! Payloads are signed over deterministic CBOR with numeric normalization.
//! See the [`canonical`] module.

pub mod canonical;
pub mod cipher;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod notary;
pub mod recordable;
pub mod replay;
pub mod types;

pub use canonical::{canonical_bytes, canonical_eq};
pub use cipher::{Base64, Bleach, Cipher, CipherRegistry};
pub use crypto::{Keypair, Signature};
pub use entry::{
    Compiled, EntryContext, EntryPayload, LedgerEntry, PayloadBuilder, RequestContext,
};
pub use error::{LedgerError, Result};
pub use notary::{Blake3Notary, Ed25519Notary, Notary, NotaryRegistry, Sha512Notary};
pub use recordable::{Identifiable, Recordable, Signable, TimestampColumns};
pub use replay::{is_current_state_reachable, verify_history, Mismatch, ReplayPolicy, Verdict};
pub use types::{Attribute, EntryId, ModelRef, Properties};
