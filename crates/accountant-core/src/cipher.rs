//! Field ciphers applied to recorded properties before signing.
//!
//! Reversible ciphers encode the JSON form of a value so the original can be
//! recovered exactly later. One-way ciphers redact its text form for good.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{LedgerError, Result};

/// Fill character used by [`Bleach`].
pub const BLEACH_FILL: char = '-';

/// A field transformation.
pub trait Cipher: Send + Sync {
    /// Identifier reported in errors.
    fn name(&self) -> &str;

    /// Whether the transformation destroys the original value.
    fn is_one_way(&self) -> bool;

    /// Transform a value. Total: every input is accepted.
    fn cipher(&self, value: &Value) -> Value;

    /// Recover the original value of a ciphered value.
    fn decipher(&self, value: &Value) -> Result<Value>;
}

/// Text form of a scalar, as seen by ciphers.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reversible base64 encoding of the value's JSON form. Obfuscation only,
/// not encryption.
///
/// `"hello"` becomes `"ImhlbGxvIg=="` and `null` becomes `"bnVsbA=="`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64;

impl Cipher for Base64 {
    fn name(&self) -> &str {
        "base64"
    }

    fn is_one_way(&self) -> bool {
        false
    }

    fn cipher(&self, value: &Value) -> Value {
        Value::String(STANDARD.encode(value.to_string()))
    }

    fn decipher(&self, value: &Value) -> Result<Value> {
        let invalid = |reason: String| LedgerError::InvalidCipherText {
            cipher: self.name().to_string(),
            reason,
        };

        let Value::String(encoded) = value else {
            return Err(invalid(format!("expected text, got {}", value)));
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| invalid(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))
    }
}

/// One-way redaction keeping roughly the last tenth of the characters.
///
/// `"N/A"` becomes `"--A"`; a single character becomes `"-"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bleach;

impl Bleach {
    fn redact(text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let tenth = len.div_ceil(10);

        // Single characters must still be redacted.
        let start = if len > tenth { len - tenth } else { 1 }.min(len);

        let mut out = String::with_capacity(text.len());
        out.extend(std::iter::repeat(BLEACH_FILL).take(start));
        out.extend(&chars[start..]);
        out
    }
}

impl Cipher for Bleach {
    fn name(&self) -> &str {
        "bleach"
    }

    fn is_one_way(&self) -> bool {
        true
    }

    fn cipher(&self, value: &Value) -> Value {
        Value::String(Self::redact(&text_of(value)))
    }

    fn decipher(&self, value: &Value) -> Result<Value> {
        Err(LedgerError::DecipherUnsupported {
            cipher: self.name().to_string(),
            value: text_of(value),
        })
    }
}

/// Maps cipher identifiers to implementations.
#[derive(Clone)]
pub struct CipherRegistry {
    ciphers: HashMap<String, Arc<dyn Cipher>>,
}

impl CipherRegistry {
    /// A registry holding [`Base64`] and [`Bleach`].
    pub fn new() -> Self {
        let mut registry = Self {
            ciphers: HashMap::new(),
        };
        registry.register("base64", Arc::new(Base64));
        registry.register("bleach", Arc::new(Bleach));
        registry
    }

    /// Add or replace a cipher under `id`.
    pub fn register(&mut self, id: impl Into<String>, cipher: Arc<dyn Cipher>) {
        self.ciphers.insert(id.into(), cipher);
    }

    /// Look up a cipher by identifier.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Cipher>> {
        self.ciphers
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidCipherImplementation(id.to_string()))
    }

    /// Fail on the first identifier in a cipher map that cannot be resolved.
    pub fn ensure_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        for id in map.values() {
            self.resolve(id)?;
        }
        Ok(())
    }
}

impl Default for CipherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CipherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.ciphers.keys().collect();
        ids.sort();
        f.debug_struct("CipherRegistry").field("ids", &ids).finish()
    }
}
