//! Replay verification: is the live state reachable from the ledger?
//!
//! Entries hold full snapshots, so replay is a left fold of their property
//! maps in creation order. The result must match the live entity exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::canonical::canonical_eq;
use crate::cipher::CipherRegistry;
use crate::entry::{LedgerEntry, OneWay};
use crate::error::{LedgerError, Result};
use crate::notary::Notary;
use crate::recordable::Recordable;
use crate::types::{parse_datetime, EntryId, Properties};

/// Which events open a history and which ones never change state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayPolicy {
    /// Event that must open every history.
    pub created_event: String,

    /// Events that are taint-checked but not folded.
    pub informational_events: Vec<String>,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            created_event: "created".into(),
            informational_events: vec!["retrieved".into()],
        }
    }
}

impl ReplayPolicy {
    fn is_informational(&self, event: &str) -> bool {
        self.informational_events.iter().any(|e| e == event)
    }
}

/// Why a history failed to reproduce the live state.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// The oldest entry is not a creation event.
    MissingCreation { event: String },

    /// The live creation timestamp differs from the first snapshot.
    CreatedAt {
        live: Value,
        recorded: Option<Value>,
    },

    /// The live update timestamp differs from the last snapshot.
    UpdatedAt {
        live: Value,
        recorded: Option<Value>,
    },

    /// An entry failed its taint check.
    Tainted(EntryId),

    /// Replayed state differs from the live attributes on these keys.
    State { keys: Vec<String> },
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    NoHistory,
    Reachable,
    Unreachable(Mismatch),
}

impl Verdict {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Verdict::Reachable)
    }
}

/// Two recorded values are the same if they are canonically equal or name
/// the same instant.
fn same_value(a: &Value, b: &Value) -> bool {
    if canonical_eq(a, b) {
        return true;
    }
    match (parse_datetime(a), parse_datetime(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn timestamp_mismatch(live: &Value, recorded: Option<&Value>) -> bool {
    recorded.map_or(true, |recorded| !same_value(live, recorded))
}

/// Keys on which two attribute maps disagree, in key order.
///
/// Only the `timestamps` columns may match as the same instant; every
/// other key must be canonically equal.
fn diverging_keys(
    folded: &Properties,
    live: &Properties,
    timestamps: (&str, &str),
) -> Vec<String> {
    let is_timestamp = |key: &str| key == timestamps.0 || key == timestamps.1;
    let mut keys: Vec<String> = folded
        .iter()
        .filter(|(key, value)| {
            live.get(*key).map_or(true, |live| {
                if is_timestamp(key) {
                    !same_value(value, live)
                } else {
                    !canonical_eq(value, live)
                }
            })
        })
        .map(|(key, _)| key.clone())
        .collect();
    keys.extend(
        live.keys()
            .filter(|key| !folded.contains_key(*key))
            .cloned(),
    );
    keys.sort();
    keys
}

/// Replay `entries` (oldest first) against the live entity.
///
/// Fails only when the entity cannot be verified at all, or when a cipher
/// in the history cannot be resolved. Integrity problems are reported in
/// the [`Verdict`].
pub fn verify_history(
    live: &dyn Recordable,
    entries: &[LedgerEntry],
    notary: &dyn Notary,
    ciphers: &CipherRegistry,
    policy: &ReplayPolicy,
) -> Result<Verdict> {
    let model = live.model_ref();

    // 1. The entity must track timestamps
    let columns = live.timestamp_columns().ok_or_else(|| {
        LedgerError::TimestampsRequired(format!("{model} does not track timestamps"))
    })?;
    let attributes = live.attributes();
    let live_created = attributes.get(&columns.created_at).ok_or_else(|| {
        LedgerError::TimestampsRequired(format!("{model} has no \"{}\"", columns.created_at))
    })?;
    let live_updated = attributes.get(&columns.updated_at).ok_or_else(|| {
        LedgerError::TimestampsRequired(format!("{model} has no \"{}\"", columns.updated_at))
    })?;

    // 2. No history, nothing to verify
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        debug!(recordable = %model, "no ledger history");
        return Ok(Verdict::NoHistory);
    };

    let verdict = replay(
        &attributes,
        (live_created, live_updated),
        (columns.created_at.as_str(), columns.updated_at.as_str()),
        (first, last),
        entries,
        notary,
        ciphers,
        policy,
    )?;

    match &verdict {
        Verdict::Reachable => debug!(recordable = %model, entries = entries.len(), "state reachable"),
        Verdict::Unreachable(mismatch) => {
            info!(recordable = %model, ?mismatch, "state unreachable from ledger")
        }
        Verdict::NoHistory => {}
    }

    Ok(verdict)
}

#[allow(clippy::too_many_arguments)]
fn replay(
    attributes: &Properties,
    (live_created, live_updated): (&Value, &Value),
    (created_column, updated_column): (&str, &str),
    (first, last): (&LedgerEntry, &LedgerEntry),
    entries: &[LedgerEntry],
    notary: &dyn Notary,
    ciphers: &CipherRegistry,
    policy: &ReplayPolicy,
) -> Result<Verdict> {
    // 3. History opens with a creation event
    if first.event() != policy.created_event {
        return Ok(Verdict::Unreachable(Mismatch::MissingCreation {
            event: first.event().to_string(),
        }));
    }

    // 4. Creation timestamp matches the first snapshot
    let recorded = first.payload.properties.get(created_column);
    if timestamp_mismatch(live_created, recorded) {
        return Ok(Verdict::Unreachable(Mismatch::CreatedAt {
            live: live_created.clone(),
            recorded: recorded.cloned(),
        }));
    }

    // 5. Update timestamp matches the last snapshot
    let recorded = last.payload.properties.get(updated_column);
    if timestamp_mismatch(live_updated, recorded) {
        return Ok(Verdict::Unreachable(Mismatch::UpdatedAt {
            live: live_updated.clone(),
            recorded: recorded.cloned(),
        }));
    }

    // 6-8. Taint-check every entry, fold the mutating ones
    let mut folded = Properties::new();
    for entry in entries {
        if entry.is_tainted(notary) {
            return Ok(Verdict::Unreachable(Mismatch::Tainted(entry.id)));
        }

        if policy.is_informational(entry.event()) {
            continue;
        }

        folded.extend(entry.deciphered_properties(ciphers, OneWay::Keep)?);
    }

    // 9. Folded state equals the live attributes
    let keys = diverging_keys(&folded, attributes, (created_column, updated_column));
    if keys.is_empty() {
        Ok(Verdict::Reachable)
    } else {
        Ok(Verdict::Unreachable(Mismatch::State { keys }))
    }
}

/// Boolean form of [`verify_history`].
pub fn is_current_state_reachable(
    live: &dyn Recordable,
    entries: &[LedgerEntry],
    notary: &dyn Notary,
    ciphers: &CipherRegistry,
    policy: &ReplayPolicy,
) -> Result<bool> {
    Ok(verify_history(live, entries, notary, ciphers, policy)?.is_reachable())
}
