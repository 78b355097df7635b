//! Store driver selection.

use std::sync::Arc;

use accountant_core::LedgerError;
use accountant_store::{MemoryStore, SqliteStore, Store};
use tracing::debug;

use crate::config::{AccountantConfig, DATABASE_DRIVER, MEMORY_DRIVER};
use crate::error::Result;

/// Open the store named by `config.driver`.
pub fn open_store(config: &AccountantConfig) -> Result<Arc<dyn Store>> {
    match config.driver.as_str() {
        MEMORY_DRIVER => {
            debug!("opening in-memory ledger store");
            Ok(Arc::new(MemoryStore::new()))
        }
        DATABASE_DRIVER => {
            let store = match &config.database_path {
                Some(path) => {
                    debug!(path = %path.display(), "opening sqlite ledger store");
                    SqliteStore::open(path)?
                }
                None => {
                    debug!("opening in-memory sqlite ledger store");
                    SqliteStore::open_memory()?
                }
            };
            Ok(Arc::new(store))
        }
        other => Err(LedgerError::UnsupportedOperation(format!("ledger driver {other:?}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccountantError;

    fn config(driver: &str) -> AccountantConfig {
        AccountantConfig {
            driver: driver.into(),
            ..AccountantConfig::default()
        }
    }

    #[test]
    fn test_known_drivers() {
        assert!(open_store(&config("memory")).is_ok());
        assert!(open_store(&config("database")).is_ok());
    }

    #[test]
    fn test_unknown_driver() {
        let err = open_store(&config("redis")).err().unwrap();
        assert!(matches!(
            err,
            AccountantError::Ledger(LedgerError::UnsupportedOperation(_))
        ));
    }
}
