//! Integrity hashes
//!
//! Advice metadata stores a SHA-256 of the financial context the answer was
//! generated from, so a stored conversation can be checked against the
//! snapshot it claims. Session tokens are persisted only as their hash.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute SHA256 hash of a serializable snapshot
/// Uses zero-copy streaming serialization into hasher
pub fn compute_context_hash<T: Serialize + ?Sized>(snapshot: &T) -> String {
    let mut hasher = Sha256::new();

    // Stream JSON directly into hasher (no intermediate String)
    if serde_json::to_writer(&mut HashWriter(&mut hasher), snapshot).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Verify a stored hash against the snapshot it was computed from
pub fn verify_context_hash<T: Serialize + ?Sized>(snapshot: &T, expected: &str) -> bool {
    !expected.is_empty() && compute_context_hash(snapshot) == expected
}

/// Hex SHA-256 of an opaque bearer token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_hash_is_stable_and_sensitive() {
        let snapshot = json!({"total_income": 3500.0, "total_expenses": 2000.0});
        let hash = compute_context_hash(&snapshot);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_context_hash(&snapshot));
        assert!(verify_context_hash(&snapshot, &hash));

        let changed = json!({"total_income": 3500.0, "total_expenses": 2100.0});
        assert!(!verify_context_hash(&changed, &hash));
    }

    #[test]
    fn test_hash_token_matches_plain_digest() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
