//! Contract hashing.
//!
//! The contract hash is a SHA-256 digest over the key->type projection of a
//! resolved config. Values are deliberately excluded: the hash tracks shape
//! compatibility, so clients relying on a stable contract detect breaking
//! changes without being invalidated by routine value edits.

use levelset_protocol::ResolvedConfig;
use sha2::{Digest, Sha256};

// ASCII unit/record separators between fields and entries to avoid
// ambiguity between adjacent keys and type names.
const FIELD_SEP: u8 = 0x1f;
const ENTRY_SEP: u8 = 0x1e;

/// Compute the hex-encoded contract hash of a resolved config.
///
/// Iteration order is the map's lexicographic key order, so the digest is
/// stable across runs for identical input.
pub fn contract_hash(config: &ResolvedConfig) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in config.iter() {
        hasher.update(key.as_bytes());
        hasher.update([FIELD_SEP]);
        hasher.update(value.kind().as_str().as_bytes());
        hasher.update([ENTRY_SEP]);
    }
    hex::encode(hasher.finalize())
}
