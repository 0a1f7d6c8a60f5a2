//! Redelivery dedup (§4.1, §5): a bounded, single-locked LRU of Event
//! Fingerprints. Mutated only by the gateway — no other component touches
//! it — matching §5's "single lock, bounded at 1000 entries, eviction
//! oldest-first" shared-resource policy.

use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use sha2::{Digest, Sha256};
use twox_hash::XxHash64;

use cortex_core::config::DEDUP_CAPACITY;
use cortex_core::types::EventFingerprint;

/// Build the `(event_id, ts, client_msg_id, user, content_hash)` tuple (§3)
/// and compress it into a single cache key by hashing its concatenation —
/// the fingerprint itself never needs to be recoverable, only comparable.
pub fn fingerprint(event_id: &str, ts: &str, client_msg_id: &str, user: &str, text: &str) -> String {
    let fp = EventFingerprint {
        event_id: event_id.to_string(),
        ts: ts.to_string(),
        client_msg_id: client_msg_id.to_string(),
        user: user.to_string(),
        content_hash: content_hash(text),
    };
    let joined = format!(
        "{}|{}|{}|{}|{}",
        fp.event_id, fp.ts, fp.client_msg_id, fp.user, fp.content_hash
    );
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// A fast, non-cryptographic hash of the message text. This fingerprint is
/// a dedup key, not a security boundary, so `twox-hash` is used instead of
/// pulling in an `md5` crate purely to replicate the original source's
/// truncated-md5 convention (Open Question, resolved in DESIGN.md).
fn content_hash(text: &str) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(text.as_bytes());
    format!("{:016x}", hasher.finish())[..8].to_string()
}

/// Bounded LRU of previously-seen fingerprints.
pub struct DedupCache {
    inner: Mutex<LruCache<String, ()>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_capacity(DEDUP_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
        }
    }

    /// Returns `true` if `key` was already present (a redelivery — caller
    /// should stop here); inserts it when absent.
    pub fn seen_before(&self, key: &str) -> bool {
        let mut cache = self.inner.lock().unwrap();
        if cache.get(key).is_some() {
            return true;
        }
        cache.put(key.to_string(), ());
        false
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_of_the_same_fingerprint_is_a_duplicate() {
        let cache = DedupCache::new();
        let fp = fingerprint("E1", "100", "c1", "U1", "hello");
        assert!(!cache.seen_before(&fp));
        assert!(cache.seen_before(&fp));
    }

    #[test]
    fn distinct_fingerprints_are_independent() {
        let cache = DedupCache::new();
        let a = fingerprint("E1", "100", "c1", "U1", "hello");
        let b = fingerprint("E2", "101", "c2", "U1", "hello");
        assert!(!cache.seen_before(&a));
        assert!(!cache.seen_before(&b));
    }

    #[test]
    fn evicts_oldest_first_once_over_capacity() {
        let cache = DedupCache::with_capacity(2);
        let a = fingerprint("E1", "1", "c", "U", "x");
        let b = fingerprint("E2", "2", "c", "U", "x");
        let c = fingerprint("E3", "3", "c", "U", "x");
        cache.seen_before(&a);
        cache.seen_before(&b);
        cache.seen_before(&c);
        // `a` was the least recently used and should have been evicted.
        assert!(!cache.seen_before(&a));
    }
}
