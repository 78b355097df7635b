//! Ledger entries: one signed snapshot per recorded event.
//!
//! An entry is immutable once stored. Everything a reader does with it
//! (compiling display data, extracting the original attributes, checking
//! for tampering) is derived from the stored payload and signature.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::cipher::CipherRegistry;
use crate::crypto::Signature;
use crate::error::{LedgerError, Result};
use crate::notary::Notary;
use crate::recordable::{Identifiable, Signable};
use crate::types::{format_millis, Attribute, EntryId, ModelRef, Properties};

/// Key under which pivot payloads are stored in `extra`.
pub const PIVOT_KEY: &str = "pivot";

/// Where the event came from, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// The signed part of a ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPayload {
    /// Event name, e.g. `"created"`. Open-ended.
    pub event: String,

    /// The tracked entity.
    pub recordable: ModelRef,

    /// The acting principal, if any.
    pub user: Option<ModelRef>,

    /// Full attribute snapshot, ciphered fields in ciphered form.
    pub properties: Properties,

    /// Attributes changed by this event.
    pub modified: Vec<String>,

    /// Attribute name to the cipher identifier applied to it.
    pub ciphers: BTreeMap<String, String>,

    /// Event-specific metadata.
    pub extra: Properties,

    pub context: RequestContext,
}

impl EntryPayload {
    /// Start building a payload for `event` on `recordable`.
    pub fn builder(event: impl Into<String>, recordable: ModelRef) -> PayloadBuilder {
        PayloadBuilder::new(event, recordable)
    }

    /// The pivot payload, if this event recorded a relationship change.
    pub fn pivot(&self) -> Option<&Value> {
        self.extra.get(PIVOT_KEY)
    }
}

impl Signable for EntryPayload {
    fn signable(&self) -> Value {
        let (user_type, user_id) = match &self.user {
            Some(user) => (json!(user.kind), json!(user.id)),
            None => (Value::Null, Value::Null),
        };

        json!({
            "event": self.event,
            "recordable_type": self.recordable.kind,
            "recordable_id": self.recordable.id,
            "user_type": user_type,
            "user_id": user_id,
            "properties": self.properties,
            "modified": self.modified,
            "ciphers": self.ciphers,
            "extra": self.extra,
            "url": self.context.url,
            "ip_address": self.context.ip_address,
            "user_agent": self.context.user_agent,
        })
    }
}

/// Builder for [`EntryPayload`]. Ciphers are applied on [`build`](Self::build).
pub struct PayloadBuilder {
    event: String,
    recordable: ModelRef,
    user: Option<ModelRef>,
    properties: Properties,
    modified: Vec<String>,
    ciphers: BTreeMap<String, String>,
    extra: Properties,
    context: RequestContext,
}

impl PayloadBuilder {
    pub fn new(event: impl Into<String>, recordable: ModelRef) -> Self {
        Self {
            event: event.into(),
            recordable,
            user: None,
            properties: Properties::new(),
            modified: Vec::new(),
            ciphers: BTreeMap::new(),
            extra: Properties::new(),
            context: RequestContext::default(),
        }
    }

    pub fn user(mut self, user: Option<ModelRef>) -> Self {
        self.user = user;
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn modified<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modified = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn ciphers(mut self, ciphers: BTreeMap<String, String>) -> Self {
        self.ciphers = ciphers;
        self
    }

    /// Merge extra metadata. Existing keys are overwritten.
    pub fn extra(mut self, extra: Properties) -> Self {
        self.extra.extend(extra);
        self
    }

    /// Record a relationship change under `extra["pivot"]`.
    pub fn pivot(mut self, relation: impl Into<String>, properties: Value) -> Self {
        self.extra.insert(
            PIVOT_KEY.to_string(),
            json!({ "relation": relation.into(), "properties": properties }),
        );
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Cipher the flagged properties and produce the payload.
    pub fn build(mut self, registry: &CipherRegistry) -> Result<EntryPayload> {
        for (key, id) in &self.ciphers {
            let value = self
                .properties
                .get_mut(key)
                .ok_or_else(|| LedgerError::InvalidProperty(key.clone()))?;
            let cipher = registry.resolve(id)?;
            *value = cipher.cipher(value);
        }

        Ok(EntryPayload {
            event: self.event,
            recordable: self.recordable,
            user: self.user,
            properties: self.properties,
            modified: self.modified,
            ciphers: self.ciphers,
            extra: self.extra,
            context: self.context,
        })
    }
}

/// A stored ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub payload: EntryPayload,
    pub signature: Signature,

    /// Unix milliseconds.
    pub created_at: i64,

    /// Unix milliseconds. Equal to `created_at` unless the row was touched.
    pub updated_at: i64,
}

/// How one-way ciphered fields are treated while deciphering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OneWay {
    /// Leave the ciphered value in place.
    Keep,
    /// Drop the field.
    Omit,
    /// Fail with `DecipherUnsupported`.
    Fail,
}

impl LedgerEntry {
    /// A freshly stored entry: both timestamps equal `at_millis`.
    pub fn new(id: EntryId, payload: EntryPayload, signature: Signature, at_millis: i64) -> Self {
        Self {
            id,
            payload,
            signature,
            created_at: at_millis,
            updated_at: at_millis,
        }
    }

    pub fn event(&self) -> &str {
        &self.payload.event
    }

    /// Whether the stored row no longer matches what was signed.
    pub fn is_tainted(&self, notary: &dyn Notary) -> bool {
        // Entries are never updated, so any drift is tampering.
        if self.created_at != self.updated_at {
            warn!(entry = %self.id, "ledger entry timestamps diverge");
            return true;
        }

        if !notary.validate(&self.payload.signable(), &self.signature) {
            warn!(entry = %self.id, "ledger entry signature mismatch");
            return true;
        }

        false
    }

    pub(crate) fn deciphered_properties(
        &self,
        ciphers: &CipherRegistry,
        one_way: OneWay,
    ) -> Result<Properties> {
        let mut properties = self.payload.properties.clone();

        for (key, id) in &self.payload.ciphers {
            if !properties.contains_key(key) {
                return Err(LedgerError::InvalidProperty(key.clone()));
            }
            let cipher = ciphers.resolve(id)?;

            if cipher.is_one_way() {
                match one_way {
                    OneWay::Keep => continue,
                    OneWay::Omit => {
                        properties.remove(key);
                        continue;
                    }
                    OneWay::Fail => {}
                }
            }

            if let Some(value) = properties.get_mut(key) {
                *value = cipher.decipher(value)?;
            }
        }

        Ok(properties)
    }

    /// Recover the original attribute map.
    ///
    /// Strict mode refuses tainted entries and one-way ciphered fields.
    /// Otherwise one-way fields are left out of the result.
    pub fn extract(
        &self,
        ciphers: &CipherRegistry,
        notary: &dyn Notary,
        strict: bool,
    ) -> Result<Properties> {
        if strict {
            if self.is_tainted(notary) {
                return Err(LedgerError::TaintedEntry(self.id));
            }
            self.deciphered_properties(ciphers, OneWay::Fail)
        } else {
            self.deciphered_properties(ciphers, OneWay::Omit)
        }
    }

    /// Flatten the entry into ledger, user and recordable keys.
    pub fn compile<'a>(&self, ctx: &EntryContext<'a>) -> Result<Compiled<'a>> {
        let prefix = ctx.user_prefix;
        let (user_type, user_id) = match &self.payload.user {
            Some(user) => (json!(user.kind), json!(user.id)),
            None => (Value::Null, Value::Null),
        };
        let context = &self.payload.context;

        let mut data = Properties::new();
        data.insert("ledger_id".into(), json!(self.id.get()));
        data.insert("ledger_event".into(), json!(self.payload.event));
        data.insert("ledger_url".into(), json!(context.url));
        data.insert("ledger_ip_address".into(), json!(context.ip_address));
        data.insert("ledger_user_agent".into(), json!(context.user_agent));
        data.insert("ledger_created_at".into(), json!(format_millis(self.created_at)));
        data.insert("ledger_updated_at".into(), json!(format_millis(self.updated_at)));
        data.insert("ledger_signature".into(), json!(self.signature.to_hex()));
        data.insert(format!("{prefix}_id"), user_id);
        data.insert(format!("{prefix}_type"), user_type);

        if let Some(user) = ctx.user {
            for (attribute, value) in user.attributes() {
                data.insert(format!("user_{attribute}"), value);
            }
        }

        let metadata_keys: Vec<String> = data.keys().cloned().collect();

        let properties = self.deciphered_properties(ctx.ciphers, OneWay::Keep)?;
        let property_keys: Vec<String> = properties.keys().cloned().collect();
        for (key, value) in properties {
            data.insert(format!("recordable_{key}"), value);
        }

        Ok(Compiled {
            data,
            metadata_keys,
            property_keys,
            modified: self.payload.modified.clone(),
            user: ctx.user,
            recordable: ctx.recordable,
        })
    }

    /// Ledger and user metadata, compiled and formatted.
    pub fn metadata(&self, ctx: &EntryContext<'_>) -> Result<Properties> {
        self.compile(ctx)?.metadata()
    }

    /// Recorded data, compiled and formatted. See [`Compiled::data`].
    pub fn data(&self, ctx: &EntryContext<'_>, all: bool) -> Result<Properties> {
        self.compile(ctx)?.data(all)
    }
}

/// What an entry needs from its surroundings to be compiled.
#[derive(Clone, Copy)]
pub struct EntryContext<'a> {
    pub ciphers: &'a CipherRegistry,
    pub user: Option<&'a dyn Identifiable>,
    pub recordable: Option<&'a dyn Identifiable>,
    pub user_prefix: &'a str,
}

impl<'a> EntryContext<'a> {
    pub fn new(ciphers: &'a CipherRegistry) -> Self {
        Self {
            ciphers,
            user: None,
            recordable: None,
            user_prefix: "user",
        }
    }

    pub fn user(mut self, user: &'a dyn Identifiable) -> Self {
        self.user = Some(user);
        self
    }

    pub fn recordable(mut self, recordable: &'a dyn Identifiable) -> Self {
        self.recordable = Some(recordable);
        self
    }

    pub fn user_prefix(mut self, prefix: &'a str) -> Self {
        self.user_prefix = prefix;
        self
    }
}

/// A compiled entry: flat keys plus the models that format them.
pub struct Compiled<'a> {
    data: Properties,
    metadata_keys: Vec<String>,
    property_keys: Vec<String>,
    modified: Vec<String>,
    user: Option<&'a dyn Identifiable>,
    recordable: Option<&'a dyn Identifiable>,
}

impl<'a> Compiled<'a> {
    /// Every compiled key with its raw value.
    pub fn raw(&self) -> &Properties {
        &self.data
    }

    /// Look up a compiled key, formatted by the owning model.
    pub fn get_property(&self, key: &str) -> Result<Attribute> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| LedgerError::InvalidProperty(key.to_string()))?;

        if let (Some(user), Some(attribute)) = (self.user, key.strip_prefix("user_")) {
            return Ok(user.format_attribute(attribute, value));
        }

        if let (Some(recordable), Some(attribute)) =
            (self.recordable, key.strip_prefix("recordable_"))
        {
            return Ok(recordable.format_attribute(attribute, value));
        }

        Ok(Attribute::Plain(value.clone()))
    }

    /// Ledger-level and user-level keys only.
    pub fn metadata(&self) -> Result<Properties> {
        self.metadata_keys
            .iter()
            .map(|key| -> Result<(String, Value)> {
                Ok((key.clone(), self.get_property(key)?.into_value()))
            })
            .collect()
    }

    /// Recorded properties, unprefixed.
    ///
    /// Only the modified keys unless `all` is set.
    pub fn data(&self, all: bool) -> Result<Properties> {
        let keys = if all {
            &self.property_keys
        } else {
            &self.modified
        };

        keys.iter()
            .map(|key| -> Result<(String, Value)> {
                let value = self.get_property(&format!("recordable_{key}"))?;
                Ok((key.clone(), value.into_value()))
            })
            .collect()
    }
}
