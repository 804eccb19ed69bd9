//! Cache entry key generation.

use sha2::{Digest, Sha256};

/// Compute the primary key of an entry in a cache generation.
///
/// The key covers the generation name and the full request URL, so the same
/// URL stored in two generations occupies two rows.
pub fn compute_entry_key(cache_name: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cache_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
