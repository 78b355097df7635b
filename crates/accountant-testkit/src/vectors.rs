//! Golden test vectors for deterministic signing.
//!
//! Each vector pins the canonical CBOR bytes of a JSON value and the
//! SHA-512 signature over them. Any implementation that reads the same
//! ledger table must reproduce these bytes exactly.

use accountant_core::{canonical_bytes, Notary, Sha512Notary};
use serde_json::Value;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The signed value, as JSON text.
    pub input: &'static str,
    /// Expected canonical encoding (hex).
    pub canonical_hex: &'static str,
    /// Expected SHA-512 notary signature (hex).
    pub sha512_hex: &'static str,
}

impl GoldenVector {
    /// Parse the input JSON.
    pub fn value(&self) -> Value {
        serde_json::from_str(self.input).unwrap_or(Value::Null)
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty map",
            input: "{}",
            canonical_hex: "a0",
            sha512_hex: "71d7479e61b530a3dae6acb291a4f9cf7fba6b5ff9a37fbaabac69dd0b04d634\
                         d23f8f8496d758511d6825eabe11111ed8df4b62785ca8fab7664e8dac3b004c",
        },
        GoldenVector {
            name: "flat attributes",
            input: r#"{"title":"Keeping Track","id":1,"reviewed":true}"#,
            canonical_hex: "a362696401657469746c656d4b656570696e6720547261636b\
                            687265766965776564f5",
            sha512_hex: "8ec4a5a43c4a13dc77712201ee1f4a45cdceab5fbf4904be30fdeb2954facd31\
                         bcbb69d425522aa907008eccf6ee6873cad709be99c9244969c153d86dec9be5",
        },
        GoldenVector {
            name: "numeric text normalizes",
            input: r#"{"id":"1","price":"12.50"}"#,
            canonical_hex: "a262696401657072696365fb4029000000000000",
            sha512_hex: "283459d87800c2ec6945117638c861116f47784ab11512ef71ee94669b2124b9\
                         9f82c49b9a347dc0594a4c1c971a1f6aa5431c59ee10e447dc13b6f145dd332d",
        },
        GoldenVector {
            name: "nested maps and arrays",
            input: r#"{"tags":["a","b"],"meta":{"z":null,"a":-3}}"#,
            canonical_hex: "a2646d657461a2616122617af664746167738261616162",
            sha512_hex: "9efbb8938dcb215fc350d1f59a18c09ba50fb6ee14145c91ade368ec1fb7e19d\
                         ce0d2d513b28bfafbd2c76cb537f460245ba6edf8b67fcf6c26ffbf3daf7e6aa",
        },
        GoldenVector {
            name: "shorter keys first",
            input: r#"{"bb":2,"a":1,"ab":3}"#,
            canonical_hex: "a36161016261620362626202",
            sha512_hex: "a2713de73bf81118591eadff1a929efe78610c2e3b1bedbc3b708f51eb4feb44\
                         784854f50996220c95dcd6022e28f9362f82298bf7f3f5890ff9e0f0ed2bb28c",
        },
    ]
}

/// Check every vector against this build.
///
/// Returns `(name, matches, canonical_hex, signature_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let value = v.value();
            let canonical = hex::encode(canonical_bytes(&value));
            let signature = Sha512Notary.sign(&value).to_hex();
            let matches = canonical == v.canonical_hex && signature == v.sha512_hex;
            (v.name.to_string(), matches, canonical, signature)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_vectors() {
        for (name, matches, canonical, signature) in verify_all_vectors() {
            assert!(
                matches,
                "Vector '{name}' diverged: canonical {canonical}, signature {signature}"
            );
        }
    }

    #[test]
    fn test_vector_inputs_parse() {
        for vector in all_vectors() {
            assert!(vector.value().is_object(), "Vector '{}' is not a map", vector.name);
        }
    }

    #[test]
    fn test_signatures_are_distinct() {
        let mut signatures: Vec<&str> = all_vectors().iter().map(|v| v.sha512_hex).collect();
        signatures.sort();
        signatures.dedup();
        assert_eq!(signatures.len(), all_vectors().len());
    }
}
