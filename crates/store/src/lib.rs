//! Storage backends for the Murmur message log and summary store.
//!
//! The SQLite backend is the durable default; the in-memory backend backs
//! tests and ephemeral runs. Both implement the `MessageLog` and
//! `SummaryStore` traits from `murmur-core` and share the same ordering
//! guarantee: appends hand out strictly increasing timestamp keys, ties
//! broken by insertion order.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, SecondsFormat, Utc};

/// Storage encoding for ordering timestamps.
///
/// Fixed-width RFC 3339 with microsecond precision and a `Z` suffix, so the
/// lexicographic order of the stored strings equals chronological order and
/// SQL comparisons on the `ts` column match key order exactly.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Monotonic key allocation: strictly after both the wall clock and every
/// previously issued key.
pub(crate) fn next_key(last_micros: &mut i64) -> Option<DateTime<Utc>> {
    let now = Utc::now().timestamp_micros();
    let key = now.max(*last_micros + 1);
    *last_micros = key;
    DateTime::from_timestamp_micros(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_ts_is_fixed_width() {
        let a = encode_ts(&DateTime::from_timestamp_micros(1_000_000).unwrap());
        let b = encode_ts(&Utc::now());
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn lexicographic_order_matches_chronological() {
        let early = DateTime::from_timestamp_micros(1_722_000_000_123_456).unwrap();
        let late = DateTime::from_timestamp_micros(1_722_000_000_123_457).unwrap();
        assert!(encode_ts(&early) < encode_ts(&late));
    }

    #[test]
    fn next_key_is_strictly_increasing() {
        let mut last = 0_i64;
        let mut prev = next_key(&mut last).unwrap();
        for _ in 0..1000 {
            let key = next_key(&mut last).unwrap();
            assert!(key > prev);
            prev = key;
        }
    }

    #[test]
    fn next_key_outruns_a_stuck_clock() {
        // Seed the allocator far in the future; keys must keep increasing
        // even though the wall clock is "behind".
        let mut last = Utc::now().timestamp_micros() + 1_000_000;
        let k1 = next_key(&mut last).unwrap();
        let k2 = next_key(&mut last).unwrap();
        assert_eq!(k2 - k1, chrono::Duration::microseconds(1));
    }
}
