//! Cache entry key derivation.

use sha2::{Digest, Sha256};

/// Derive the storage key for a cache entry.
///
/// Entries are addressed by request method and URL, scoped to a generation,
/// per ordinary HTTP cache semantics. Two concurrent writes for the same
/// request derive the same key and the later upsert wins.
pub fn entry_key(generation: &str, method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.as_bytes());
    hasher.update(b"\n");
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
