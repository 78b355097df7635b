//! Accountant configuration.

use std::path::PathBuf;

use accountant_core::notary::DEFAULT_NOTARY;
use accountant_core::ReplayPolicy;
use serde::Deserialize;

/// Driver backed by [`accountant_store::MemoryStore`].
pub const MEMORY_DRIVER: &str = "memory";

/// Driver backed by [`accountant_store::SqliteStore`].
pub const DATABASE_DRIVER: &str = "database";

/// Configuration for the Accountant.
///
/// Every field has a default, so a partial JSON or TOML document
/// deserializes into a usable config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AccountantConfig {
    /// Entries kept per recordable. `0` keeps everything.
    pub threshold: usize,
    /// Events that produce a ledger entry.
    pub events: Vec<String>,
    /// Notary identifier used to sign new entries and check old ones.
    pub notary: String,
    /// Store driver: `"memory"` or `"database"`.
    pub driver: String,
    /// SQLite file for the database driver. In-memory SQLite when absent.
    pub database_path: Option<PathBuf>,
    /// Prefix of the acting user's keys in compiled entries.
    pub user_prefix: String,
    /// Replay rules.
    pub replay: ReplayPolicy,
}

impl Default for AccountantConfig {
    fn default() -> Self {
        Self {
            threshold: 0,
            events: ["created", "updated", "deleted", "restored"]
                .into_iter()
                .map(String::from)
                .collect(),
            notary: DEFAULT_NOTARY.into(),
            driver: DATABASE_DRIVER.into(),
            database_path: None,
            user_prefix: "user".into(),
            replay: ReplayPolicy::default(),
        }
    }
}

impl AccountantConfig {
    /// Whether `event` is recorded when the entity has no override.
    pub fn records(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }
}
