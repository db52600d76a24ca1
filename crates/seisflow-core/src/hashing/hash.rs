//! Hash helpers, kept behind a small API so the algorithm can change
//! without touching callers. BLAKE3 for speed; `Download.config_hash`
//! (§3) is the only consumer today.

use crate::hashing::to_canonical_json;
use blake3::Hasher;
use serde_json::Value;

/// Hashes a string, returning its hex digest.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hashes a JSON value after canonicalizing it first.
pub fn hash_value(v: &Value) -> String {
    let canonical = to_canonical_json(v);
    hash_str(&canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_value_is_stable_across_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash_value(&a), hash_value(&b));
    }
}
