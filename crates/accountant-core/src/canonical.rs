//! Canonical CBOR encoding for deterministic signing.
//!
//! Ledger payloads are JSON values. Before hashing they are converted to CBOR
//! and encoded following RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison, at every depth
//! - Arrays keep their element order
//! - Integers use smallest valid encoding
//! - Definite lengths only
//!
//! On top of that, numbers are normalized: numeric strings are read as
//! numbers and integral floats collapse to integers, so `"1"`, `1` and `1.0`
//! encode to the same bytes. Persisted values round-trip through text
//! columns, and the signature must survive that trip.

use ciborium::value::Value as Cbor;
use serde_json::{Number, Value};

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_SAFE_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Encode a JSON value to canonical CBOR bytes.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &to_canonical_value(value));
    buf
}

/// Compare two JSON values under canonical normalization.
///
/// `canonical_eq(&json!("1"), &json!(1.0))` is true.
pub fn canonical_eq(a: &Value, b: &Value) -> bool {
    canonical_bytes(a) == canonical_bytes(b)
}

/// Convert a JSON value into its normalized CBOR form.
pub fn to_canonical_value(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Number(n) => number_to_cbor(n),
        Value::String(s) => numeric_string(s).unwrap_or_else(|| Cbor::Text(s.clone())),
        Value::Array(items) => Cbor::Array(items.iter().map(to_canonical_value).collect()),
        Value::Object(map) => Cbor::Map(
            map.iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), to_canonical_value(v)))
                .collect(),
        ),
    }
}

fn number_to_cbor(n: &Number) -> Cbor {
    if let Some(i) = n.as_i64() {
        return Cbor::Integer(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Cbor::Integer(u.into());
    }
    match n.as_f64() {
        Some(f) => float_to_cbor(f),
        None => Cbor::Text(n.to_string()),
    }
}

fn float_to_cbor(f: f64) -> Cbor {
    if f.fract() == 0.0 && f.abs() < MAX_SAFE_FLOAT_INT {
        Cbor::Integer((f as i64).into())
    } else {
        Cbor::Float(f)
    }
}

/// Read a string as a number when it is entirely numeric.
fn numeric_string(s: &str) -> Option<Cbor> {
    let plausible = !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !plausible {
        return None;
    }

    if let Ok(i) = s.parse::<i64>() {
        return Some(Cbor::Integer(i.into()));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Cbor::Integer(u.into()));
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Some(float_to_cbor(f)),
        _ => None,
    }
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Cbor) {
    match value {
        Cbor::Integer(i) => encode_integer(buf, *i),
        Cbor::Bytes(b) => encode_bytes(buf, b),
        Cbor::Text(s) => encode_text(buf, s),
        Cbor::Array(arr) => encode_array(buf, arr),
        Cbor::Map(entries) => encode_map_canonical(buf, entries),
        Cbor::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Cbor::Float(f) => encode_float(buf, *f),
        // Tags never come out of `to_canonical_value`; encode the inner value.
        Cbor::Tag(_, inner) => encode_value_to(buf, inner),
        _ => buf.push(0xf6),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a double-precision float (major type 7, additional info 27).
fn encode_float(buf: &mut Vec<u8>, f: f64) {
    buf.push(0xfb);
    buf.extend_from_slice(&f.to_be_bytes());
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Cbor]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Cbor, Cbor)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Cbor)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        // 0-23: single byte
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        // 24-255: two bytes
        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        // 256-65535: three bytes
        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 65535);
        assert_eq!(buf, vec![0x19, 0xff, 0xff]);
    }

    #[test]
    fn test_negative_integer_encoding() {
        assert_eq!(canonical_bytes(&json!(-1)), vec![0x20]);
        assert_eq!(canonical_bytes(&json!(-25)), vec![0x38, 24]);
    }

    #[test]
    fn test_map_key_ordering() {
        // Shorter text keys sort first: their header byte is smaller.
        let bytes = canonical_bytes(&json!({"bb": 2, "a": 1, "ab": 3}));
        assert_eq!(
            bytes,
            vec![
                0xa3, // map(3)
                0x61, b'a', 0x01, // "a": 1
                0x62, b'a', b'b', 0x03, // "ab": 3
                0x62, b'b', b'b', 0x02, // "bb": 2
            ]
        );
    }

    #[test]
    fn test_nested_map_order_independent() {
        let a = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let b = json!({"b": {"y": 2, "x": 1}, "a": 1});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(
            canonical_bytes(&json!(["a", "b"])),
            canonical_bytes(&json!(["b", "a"]))
        );
    }

    #[test]
    fn test_numeric_normalization() {
        assert!(canonical_eq(&json!("1"), &json!(1)));
        assert!(canonical_eq(&json!(1.0), &json!(1)));
        assert!(canonical_eq(&json!("1.0"), &json!(1)));
        assert!(canonical_eq(&json!("-2.5"), &json!(-2.5)));
        assert!(canonical_eq(&json!("1e3"), &json!(1000)));
        assert!(canonical_eq(&json!({"n": "42"}), &json!({"n": 42})));
    }

    #[test]
    fn test_non_numeric_strings_stay_text() {
        assert!(!canonical_eq(&json!("1a"), &json!(1)));
        assert!(!canonical_eq(&json!("e"), &json!(0)));
        assert!(!canonical_eq(&json!("inf"), &json!(f64::MAX)));
        assert_eq!(canonical_bytes(&json!("")), vec![0x60]);
    }

    #[test]
    fn test_float_encoding() {
        let bytes = canonical_bytes(&json!(1.5));
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(&bytes[1..], &1.5f64.to_be_bytes());
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_bytes(&json!(null)), vec![0xf6]);
        assert_eq!(canonical_bytes(&json!(true)), vec![0xf5]);
        assert_eq!(canonical_bytes(&json!(false)), vec![0xf4]);
    }

    proptest! {
        #[test]
        fn test_insertion_order_never_matters(
            entries in prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 0..16)
        ) {
            let mut forward = serde_json::Map::new();
            for (k, v) in entries.iter() {
                forward.insert(k.clone(), json!(v));
            }
            let mut backward = serde_json::Map::new();
            for (k, v) in entries.iter().rev() {
                backward.insert(k.clone(), json!(v));
            }

            prop_assert_eq!(
                canonical_bytes(&Value::Object(forward)),
                canonical_bytes(&Value::Object(backward))
            );
        }

        #[test]
        fn test_integer_strings_match_integers(n in any::<i64>()) {
            prop_assert!(canonical_eq(&json!(n.to_string()), &json!(n)));
        }
    }
}
