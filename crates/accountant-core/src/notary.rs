//! Notaries sign canonical ledger payloads.
//!
//! A notary turns a JSON payload into a 64-byte [`Signature`] over its
//! canonical CBOR bytes. Digest notaries are pure functions of the payload;
//! the Ed25519 notary additionally binds the signature to a private key.

use serde_json::Value;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::canonical::canonical_bytes;
use crate::crypto::{Keypair, Signature, SIGNATURE_LEN};
use crate::error::{LedgerError, Result};

/// Identifier of the default notary.
pub const DEFAULT_NOTARY: &str = "sha512";

/// Signs and validates ledger payloads.
pub trait Notary: Send + Sync {
    /// Sign a payload. Identical logical content yields an identical signature.
    fn sign(&self, data: &Value) -> Signature;

    /// Check a payload against a previously produced signature.
    fn validate(&self, data: &Value, signature: &Signature) -> bool {
        self.sign(data) == *signature
    }
}

/// SHA-512 over the canonical bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Notary;

impl Notary for Sha512Notary {
    fn sign(&self, data: &Value) -> Signature {
        let digest = Sha512::digest(canonical_bytes(data));
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&digest);
        Signature(bytes)
    }
}

/// Blake3 in derive-key mode, extended to 64 bytes of output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Notary;

impl Blake3Notary {
    const CONTEXT: &'static str = "accountant-ledger-v0-signature";
}

impl Notary for Blake3Notary {
    fn sign(&self, data: &Value) -> Signature {
        let mut hasher = blake3::Hasher::new_derive_key(Self::CONTEXT);
        hasher.update(&canonical_bytes(data));
        let mut bytes = [0u8; SIGNATURE_LEN];
        hasher.finalize_xof().fill(&mut bytes);
        Signature(bytes)
    }
}

/// Ed25519 signatures over the canonical bytes.
///
/// Unlike the digest notaries, a party without the private key cannot
/// re-sign a forged payload.
#[derive(Clone)]
pub struct Ed25519Notary {
    keypair: Keypair,
}

impl Ed25519Notary {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// The public half of the signing key.
    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }
}

impl fmt::Debug for Ed25519Notary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Notary")
            .field("keypair", &self.keypair)
            .finish()
    }
}

impl Notary for Ed25519Notary {
    fn sign(&self, data: &Value) -> Signature {
        self.keypair.sign(&canonical_bytes(data))
    }

    fn validate(&self, data: &Value, signature: &Signature) -> bool {
        self.keypair.verify(&canonical_bytes(data), signature)
    }
}

/// Maps notary identifiers to implementations.
#[derive(Clone)]
pub struct NotaryRegistry {
    notaries: HashMap<String, Arc<dyn Notary>>,
}

impl NotaryRegistry {
    /// A registry holding the built-in digest notaries.
    pub fn new() -> Self {
        let mut registry = Self {
            notaries: HashMap::new(),
        };
        registry.register(DEFAULT_NOTARY, Arc::new(Sha512Notary));
        registry.register("blake3", Arc::new(Blake3Notary));
        registry
    }

    /// Add or replace a notary under `id`.
    pub fn register(&mut self, id: impl Into<String>, notary: Arc<dyn Notary>) {
        self.notaries.insert(id.into(), notary);
    }

    /// Look up a notary by identifier.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Notary>> {
        self.notaries
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidNotaryImplementation(id.to_string()))
    }
}

impl Default for NotaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.notaries.keys().collect();
        ids.sort();
        f.debug_struct("NotaryRegistry").field("ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sign_ignores_key_order() {
        let notary = Sha512Notary;
        let a = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let b = json!({"b": {"y": 2, "x": 1}, "a": 1});
        assert_eq!(notary.sign(&a), notary.sign(&b));
    }

    #[test]
    fn test_sign_normalizes_numbers() {
        let notary = Sha512Notary;
        assert_eq!(
            notary.sign(&json!({"views": "10"})),
            notary.sign(&json!({"views": 10.0}))
        );
    }

    #[test]
    fn test_sign_detects_changes() {
        let notary = Sha512Notary;
        let sig = notary.sign(&json!({"title": "A"}));
        assert!(notary.validate(&json!({"title": "A"}), &sig));
        assert!(!notary.validate(&json!({"title": "B"}), &sig));
    }

    #[test]
    fn test_digest_notaries_differ() {
        let data = json!({"title": "A"});
        assert_ne!(Sha512Notary.sign(&data), Blake3Notary.sign(&data));
    }

    #[test]
    fn test_sha512_matches_plain_digest() {
        let data = json!({"a": 1});
        let expected = Sha512::digest(canonical_bytes(&data));
        assert_eq!(Sha512Notary.sign(&data).as_bytes()[..], expected[..]);
    }

    #[test]
    fn test_ed25519_notary() {
        let notary = Ed25519Notary::new(Keypair::from_seed(&[7u8; 32]));
        let data = json!({"b": [1, 2], "a": "x"});
        let sig = notary.sign(&data);

        assert!(notary.validate(&json!({"a": "x", "b": [1, 2]}), &sig));
        assert!(!notary.validate(&json!({"a": "x", "b": [2, 1]}), &sig));

        let other = Ed25519Notary::new(Keypair::from_seed(&[8u8; 32]));
        assert!(!other.validate(&data, &sig));
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = NotaryRegistry::new();
        assert!(registry.resolve("sha512").is_ok());
        assert!(registry.resolve("blake3").is_ok());
        assert_eq!(
            registry.resolve("md5").err(),
            Some(LedgerError::InvalidNotaryImplementation("md5".into()))
        );

        registry.register("ed25519", Arc::new(Ed25519Notary::new(Keypair::generate())));
        assert!(registry.resolve("ed25519").is_ok());
    }

    proptest! {
        #[test]
        fn test_sign_is_deterministic(
            entries in prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..12)
        ) {
            let data = json!(entries);
            prop_assert_eq!(Sha512Notary.sign(&data), Sha512Notary.sign(&data.clone()));
            prop_assert_eq!(Blake3Notary.sign(&data), Blake3Notary.sign(&data.clone()));
        }
    }
}
