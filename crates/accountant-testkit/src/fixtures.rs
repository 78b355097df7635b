//! Test fixtures.
//!
//! Two small models: an [`Article`] that is recorded and a [`User`] that
//! acts on it.

use std::collections::BTreeMap;

use accountant_core::types::parse_datetime;
use accountant_core::{Attribute, Identifiable, ModelRef, Properties, Recordable};
use serde_json::{json, Value};

/// Creation time of every fresh [`Article`].
pub const CREATED_AT: &str = "2012-06-14 15:03:03";

/// A recordable article.
///
/// Attributes are stored the way a database row would hand them over:
/// `reviewed` as `0`/`1` and dates as formatted text.
#[derive(Debug, Clone)]
pub struct Article {
    attributes: Properties,
    ciphers: BTreeMap<String, String>,
    events: Option<Vec<String>>,
    threshold: Option<usize>,
}

impl Article {
    /// A fresh article with id `id`.
    pub fn new(id: u64) -> Self {
        let mut attributes = Properties::new();
        attributes.insert("id".into(), json!(id));
        attributes.insert("title".into(), json!("Keeping Track Of Eloquent Model Changes"));
        attributes.insert(
            "content".into(),
            json!("First step: install the Accountant package."),
        );
        attributes.insert("published_at".into(), Value::Null);
        attributes.insert("reviewed".into(), json!(0));
        attributes.insert("created_at".into(), json!(CREATED_AT));
        attributes.insert("updated_at".into(), json!(CREATED_AT));

        Self {
            attributes,
            ciphers: BTreeMap::new(),
            events: None,
            threshold: None,
        }
    }

    /// Cipher `key` with the cipher registered as `cipher`.
    pub fn with_cipher(mut self, key: &str, cipher: &str) -> Self {
        self.ciphers.insert(key.to_string(), cipher.to_string());
        self
    }

    /// Only record these events.
    pub fn with_events(mut self, events: &[&str]) -> Self {
        self.events = Some(events.iter().map(|e| e.to_string()).collect());
        self
    }

    /// Keep at most `threshold` entries.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute without touching timestamps.
    pub fn set(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    /// Remove an attribute.
    pub fn forget(&mut self, key: &str) {
        self.attributes.remove(key);
    }

    /// Set `updated_at`.
    pub fn touch(&mut self, at: &str) {
        self.set("updated_at", json!(at));
    }
}

impl Identifiable for Article {
    fn model_ref(&self) -> ModelRef {
        let id = self.attributes.get("id").cloned().unwrap_or(Value::Null);
        match id {
            Value::String(s) => ModelRef::new("article", s),
            other => ModelRef::new("article", other),
        }
    }

    fn attributes(&self) -> Properties {
        self.attributes.clone()
    }

    fn format_attribute(&self, key: &str, value: &Value) -> Attribute {
        match key {
            "title" => match value.as_str() {
                Some(title) => Attribute::Plain(json!(title.to_uppercase())),
                None => Attribute::Plain(value.clone()),
            },
            "reviewed" => Attribute::Plain(json!(truthy(value))),
            "published_at" | "created_at" | "updated_at" => match parse_datetime(value) {
                Some(at) => Attribute::DateTime(at),
                None => Attribute::Plain(value.clone()),
            },
            _ => Attribute::Plain(value.clone()),
        }
    }
}

impl Recordable for Article {
    fn ciphers(&self) -> BTreeMap<String, String> {
        self.ciphers.clone()
    }

    fn ledger_events(&self) -> Option<Vec<String>> {
        self.events.clone()
    }

    fn ledger_threshold(&self) -> Option<usize> {
        self.threshold
    }

    fn extra_ledger_data(
        &self,
        _event: &str,
        _properties: &Properties,
        user: Option<&dyn Identifiable>,
    ) -> Properties {
        let mut extra = Properties::new();
        if let Some(user) = user {
            extra.insert("actor".into(), json!(user.model_ref().to_string()));
        }
        extra
    }
}

/// A user acting on articles.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl User {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            is_admin: false,
        }
    }
}

impl Identifiable for User {
    fn model_ref(&self) -> ModelRef {
        ModelRef::new("user", self.id)
    }

    fn attributes(&self) -> Properties {
        let mut attributes = Properties::new();
        attributes.insert("id".into(), json!(self.id));
        attributes.insert("name".into(), json!(self.name));
        attributes.insert("email".into(), json!(self.email));
        attributes.insert("is_admin".into(), json!(if self.is_admin { 1 } else { 0 }));
        attributes
    }

    fn format_attribute(&self, key: &str, value: &Value) -> Attribute {
        match key {
            "is_admin" => Attribute::Plain(json!(truthy(value))),
            _ => Attribute::Plain(value.clone()),
        }
    }
}

/// Database-style boolean cast.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
