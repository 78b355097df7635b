//! Error types for the Accountant.

use accountant_core::LedgerError;
use accountant_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Accountant operations.
#[derive(Debug, Error)]
pub enum AccountantError {
    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Recording is suppressed for this call.
    #[error("recording is disabled")]
    RecordingDisabled,
}

/// Result type for Accountant operations.
pub type Result<T> = std::result::Result<T, AccountantError>;
