//! Error types for the Accountant Core.

use thiserror::Error;

use crate::types::EntryId;

/// Errors raised by ciphers, notaries, ledger entries and replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A referenced attribute is absent from the stored snapshot or was never compiled.
    #[error("invalid property: \"{0}\"")]
    InvalidProperty(String),

    /// A cipher identifier could not be resolved.
    #[error("invalid cipher implementation: \"{0}\"")]
    InvalidCipherImplementation(String),

    /// A notary identifier could not be resolved.
    #[error("invalid notary implementation: \"{0}\"")]
    InvalidNotaryImplementation(String),

    /// Attempt to reverse a one-way cipher.
    #[error("cipher \"{cipher}\" does not support deciphering (value: {value})")]
    DecipherUnsupported { cipher: String, value: String },

    /// A reversible cipher was handed text it never produced.
    #[error("cipher \"{cipher}\" cannot decipher value: {reason}")]
    InvalidCipherText { cipher: String, reason: String },

    /// Signature or timestamp mismatch on a stored entry.
    #[error("ledger entry {0} is tainted")]
    TaintedEntry(EntryId),

    /// The entity does not track creation/update timestamps.
    #[error("timestamps required: {0}")]
    TimestampsRequired(String),

    /// Operation not supported by the selected component.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The event is not recordable for this entity.
    #[error("invalid event: \"{0}\"")]
    InvalidEvent(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
