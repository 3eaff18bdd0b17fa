//! Canonical JSON hashing.
//!
//! Object keys are sorted recursively before encoding so that semantically
//! equal documents hash identically regardless of field order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex chars kept for short content ids (policy hash, parameter hash).
pub const SHORT_HASH_LEN: usize = 16;

/// Sort object keys recursively. Arrays keep their order.
pub fn canonicalize(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = serde_json::Map::new();
            for k in keys {
                if let Some(child) = map.get(k) {
                    sorted.insert(k.clone(), canonicalize(child));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical byte encoding of a JSON value.
pub fn canonical_bytes(v: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&canonicalize(v))?)
}

/// SHA-256 of arbitrary bytes, hex encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Full SHA-256 hex of a JSON value's canonical form.
pub fn value_hash(v: &Value) -> Result<String> {
    Ok(sha256_hex(&canonical_bytes(v)?))
}

/// Full SHA-256 hex of any serializable value's canonical form.
pub fn content_hash<T: Serialize>(item: &T) -> Result<String> {
    value_hash(&serde_json::to_value(item)?)
}

/// Truncated content hash used in ids.
pub fn short_hash<T: Serialize>(item: &T) -> Result<String> {
    let mut h = content_hash(item)?;
    h.truncate(SHORT_HASH_LEN);
    Ok(h)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": null}});
        let b = json!({"a": {"x": null, "y": [1, 2]}, "b": 1});
        assert_eq!(value_hash(&a).unwrap(), value_hash(&b).unwrap());
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(value_hash(&a).unwrap(), value_hash(&b).unwrap());
    }

    #[test]
    fn short_hash_is_prefix() {
        let v = json!({"k": "v"});
        let full = content_hash(&v).unwrap();
        let short = short_hash(&v).unwrap();
        assert_eq!(short.len(), SHORT_HASH_LEN);
        assert!(full.starts_with(&short));
    }
}
