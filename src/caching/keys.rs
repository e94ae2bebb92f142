//! Deterministic cache key generation
//!
//! Keys are content-addressed: a prefix plus the SHA-256 of a canonical
//! rendering of the logical arguments. Canonicalization recursively sorts
//! object keys, so the same logical request produces the same key regardless
//! of map insertion order or object identity. Keys are shared across
//! processes through the L2 tier, which is why a stable hash is used rather
//! than the per-process `DefaultHasher`.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Build a cache key from a prefix and any serializable argument bundle.
pub fn cache_key<T: Serialize>(prefix: &str, args: &T) -> String {
    let value = match serde_json::to_value(args) {
        Ok(v) => v,
        // Unserializable arguments cannot be content-addressed; hash the
        // error text so the key is still stable for the same failure.
        Err(e) => Value::String(format!("unserializable:{}", e)),
    };
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);
    composite_key(&[prefix, &hash_str(&canonical)])
}

/// Join key components with the tier-wide separator.
pub fn composite_key(components: &[&str]) -> String {
    components.join("::")
}

/// Hex-encoded SHA-256 of a string.
pub fn hash_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
