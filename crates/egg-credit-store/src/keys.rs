//! Key encoding for the ordered key-value backend.
//!
//! Per-user keys start with the user ID followed by a `0x00` separator. User IDs
//! never contain control characters, so the separator makes the prefix of one
//! user disjoint from every other user's keys.

use chrono::{DateTime, Utc};
use egg_credit_core::{EventId, PackageId, UserId};

use crate::error::{Result, StoreError};

const SEPARATOR: u8 = 0x00;

/// Prefix shared by all per-user keys of `user_id`.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_str().len() + 1);
    key.extend_from_slice(user_id.as_str().as_bytes());
    key.push(SEPARATOR);
    key
}

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_str().as_bytes().to_vec()
}

/// Decode the user ID from a balance key.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the key is not a valid user ID.
pub fn user_from_balance_key(key: &[u8]) -> Result<UserId> {
    let raw = std::str::from_utf8(key).map_err(|e| StoreError::CorruptKey(e.to_string()))?;
    UserId::new(raw).map_err(|e| StoreError::CorruptKey(e.to_string()))
}

/// Create a package key from a package ID.
#[must_use]
pub fn package_key(package_id: &PackageId) -> Vec<u8> {
    package_id.as_str().as_bytes().to_vec()
}

/// Create an event key.
///
/// Format: `user_id || 0x00 || seconds (8 bytes, big-endian, sign bit flipped) ||
/// subsecond nanos (4 bytes, big-endian) || event_id (16 bytes)`
///
/// Flipping the sign bit makes negative timestamps sort before positive ones, so
/// a forward scan over the user prefix yields events in ascending time order at
/// full timestamp precision. Events with identical timestamps are ordered by
/// their event ID, which increases in creation order.
#[must_use]
pub fn event_key(user_id: &UserId, timestamp: DateTime<Utc>, event_id: &EventId) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    #[allow(clippy::cast_sign_loss)]
    let seconds = (timestamp.timestamp() as u64) ^ (1 << 63);
    key.extend_from_slice(&seconds.to_be_bytes());
    key.extend_from_slice(&timestamp.timestamp_subsec_nanos().to_be_bytes());
    key.extend_from_slice(&event_id.to_bytes());
    key
}

/// Create a per-user key with a string suffix.
#[must_use]
pub fn user_scoped_key(user_id: &UserId, suffix: &str) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(suffix.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[test]
    fn event_keys_sort_by_time() {
        let id = EventId::generate();
        let t0 = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        let t2 = t1 + Duration::milliseconds(1);

        let k0 = event_key(&user("u"), t0, &id);
        let k1 = event_key(&user("u"), t1, &id);
        let k2 = event_key(&user("u"), t2, &id);

        assert!(k0 < k1);
        assert!(k1 < k2);
        assert_eq!(k1.len(), 1 + 1 + 8 + 4 + 16);
    }

    #[test]
    fn event_keys_order_within_a_millisecond() {
        let base = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        for _ in 0..200 {
            // The later event gets the smaller id.
            let late = event_key(&user("u"), base + Duration::microseconds(900), &EventId::generate());
            let early = event_key(&user("u"), base + Duration::microseconds(100), &EventId::generate());
            assert!(early < late);
        }
    }

    #[test]
    fn equal_timestamps_keep_creation_order() {
        let at = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(7);
        let keys: Vec<_> = (0..100)
            .map(|_| event_key(&user("u"), at, &EventId::generate()))
            .collect();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn user_prefixes_do_not_overlap() {
        let id = EventId::generate();
        let key = event_key(&user("ab"), Utc::now(), &id);
        assert!(key.starts_with(&user_prefix(&user("ab"))));
        assert!(!key.starts_with(&user_prefix(&user("a"))));
    }

    #[test]
    fn balance_key_roundtrip() {
        let key = balance_key(&user("user-7"));
        assert_eq!(user_from_balance_key(&key).unwrap(), user("user-7"));
        assert!(user_from_balance_key(&[0xff, 0xfe]).is_err());
    }
}
