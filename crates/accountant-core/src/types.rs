//! Strong type definitions for the Accountant ledger.
//!
//! Identifiers are newtypes so an entry id can never be confused with an
//! entity's own primary key.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A flat attribute map, ordered by key.
pub type Properties = BTreeMap<String, Value>;

/// Canonical date-time format used when serializing timestamps.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sequence number of a ledger entry within a store.
///
/// Assigned on append, strictly increasing, never reused after pruning.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Create a new EntryId.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw sequence number.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Opaque reference to a model: its type plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    /// Model type (e.g. `"article"`).
    pub kind: String,
    /// Model identifier, in text form.
    pub id: String,
}

impl ModelRef {
    /// Create a new model reference.
    pub fn new(kind: impl Into<String>, id: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An attribute value after model-level formatting.
///
/// Formatting hooks may promote a raw value into a date-time; everything
/// else stays a plain JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Plain(Value),
    DateTime(DateTime<Utc>),
}

impl Attribute {
    /// Collapse into a JSON value, serializing date-times with [`DATE_FORMAT`].
    pub fn into_value(self) -> Value {
        match self {
            Attribute::Plain(value) => value,
            Attribute::DateTime(dt) => Value::String(format_datetime(&dt)),
        }
    }

    /// Borrow the plain value, if this is not a date-time.
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Attribute::Plain(value) => Some(value),
            Attribute::DateTime(_) => None,
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Plain(value)
    }
}

/// Format a date-time with [`DATE_FORMAT`].
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

/// Format Unix milliseconds with [`DATE_FORMAT`].
pub fn format_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => format_datetime(&dt),
        None => millis.to_string(),
    }
}

/// Interpret a stored value as a date-time.
///
/// Accepts [`DATE_FORMAT`] strings, RFC 3339 strings and integer Unix
/// milliseconds.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => NaiveDateTime::parse_from_str(s, DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
