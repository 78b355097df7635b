//! Capability traits implemented by tracked entities and acting principals.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{Attribute, ModelRef, Properties};

/// Names of the creation and update timestamp attributes of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created_at: String,
    pub updated_at: String,
}

impl TimestampColumns {
    pub fn new(created_at: impl Into<String>, updated_at: impl Into<String>) -> Self {
        Self {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self::new("created_at", "updated_at")
    }
}

/// Anything that can be referenced from a ledger entry.
pub trait Identifiable {
    /// Type and identifier of this model.
    fn model_ref(&self) -> ModelRef;

    /// Current attribute values, unformatted.
    fn attributes(&self) -> Properties;

    /// Display formatting for a single attribute (accessors, casts, dates).
    fn format_attribute(&self, _key: &str, value: &Value) -> Attribute {
        Attribute::Plain(value.clone())
    }
}

/// An entity whose lifecycle events are recorded in a ledger.
pub trait Recordable: Identifiable {
    /// Attribute name to cipher identifier.
    fn ciphers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Timestamp attributes, or `None` if the entity does not track them.
    fn timestamp_columns(&self) -> Option<TimestampColumns> {
        Some(TimestampColumns::default())
    }

    /// Events this entity records. `None` defers to configuration.
    fn ledger_events(&self) -> Option<Vec<String>> {
        None
    }

    /// Retention threshold. `None` defers to configuration.
    fn ledger_threshold(&self) -> Option<usize> {
        None
    }

    /// Event-specific metadata stored alongside the snapshot.
    fn extra_ledger_data(
        &self,
        _event: &str,
        _properties: &Properties,
        _user: Option<&dyn Identifiable>,
    ) -> Properties {
        Properties::new()
    }
}

/// Something with a canonical payload to sign.
pub trait Signable {
    fn signable(&self) -> Value;
}
