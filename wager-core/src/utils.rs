//! # Utility Functions
//!
//! Id derivation, hashing and timestamp formatting.

use sha2::{Digest, Sha256};

use crate::{BetId, Principal, Timestamp};

/// Derive a bet id from its parties, proposition and a creation sequence number.
///
/// The sequence number makes ids unique even for identical terms.
pub fn derive_bet_id(
    sequence: u64,
    creator: &Principal,
    counterparty: &Principal,
    proposition: &str,
) -> BetId {
    let mut hasher = Sha256::new();
    let to_serialize = (sequence, creator, counterparty, proposition);
    hasher.update(
        serde_json::to_string(&to_serialize)
            .unwrap_or_default()
            .as_bytes(),
    );
    let hash = hasher.finalize();
    BetId::new(hex::encode(&hash[..8]).to_uppercase())
}

/// Hash a message using SHA256
pub fn sha256_hash(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    let hash = hasher.finalize();
    hex::encode(hash)
}

/// Format timestamp as human-readable string
pub fn format_timestamp(timestamp: Timestamp) -> String {
    use chrono::DateTime;
    let dt = DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_bet_id() {
        let alice = Principal::from("alice");
        let bob = Principal::from("bob");

        let id = derive_bet_id(0, &alice, &bob, "It rains");
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(id, derive_bet_id(0, &alice, &bob, "It rains"));
        assert_ne!(id, derive_bet_id(1, &alice, &bob, "It rains"));
        assert_ne!(id, derive_bet_id(0, &bob, &alice, "It rains"));
    }

    #[test]
    fn test_sha256_hash() {
        let hash = sha256_hash("Hello, World!");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1735689600), "2025-01-01 00:00:00 UTC");
    }
}
