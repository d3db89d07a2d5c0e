//! Deterministic chunk id derivation.
//!
//! Ids are derived from (source path, ordinal, content fingerprint) rather
//! than assigned at random, so re-indexing unchanged content is an upsert
//! by the same id instead of a duplicate insert.

use sha2::{Digest, Sha256};
use uuid::{Uuid, uuid};

/// Namespace UUID for retrieva chunk ids.
const RETRIEVA_NAMESPACE: Uuid = uuid!("a8f5c3e2-7b9d-4f2a-9e1c-3d5a7b9f1e3c");

/// Sha256 hex digest of `content`, used as the chunk fingerprint.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive a stable chunk id from its source path, ordinal within that
/// source, and content fingerprint.
///
/// The fingerprint is included (rather than relying on path+ordinal alone)
/// so a structural edit that shifts ordinals elsewhere in the file does not
/// silently alias one chunk's id onto different content; only identical
/// content at the same position in the same file reuses an id.
pub fn stable_chunk_id(source_path: &str, ordinal: usize, content: &str) -> Uuid {
    let data = format!("{source_path}:{ordinal}:{}", fingerprint(content));
    Uuid::new_v5(&RETRIEVA_NAMESPACE, data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_id() {
        let id1 = stable_chunk_id("src/main.rs", 0, "fn main() {}");
        let id2 = stable_chunk_id("src/main.rs", 0, "fn main() {}");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_content_same_position_produces_different_id() {
        let id1 = stable_chunk_id("src/main.rs", 0, "fn main() {}");
        let id2 = stable_chunk_id("src/main.rs", 0, "fn main() { println!(); }");
        assert_ne!(id1, id2);
    }

    #[test]
    fn different_ordinal_produces_different_id() {
        let id1 = stable_chunk_id("src/main.rs", 0, "fn main() {}");
        let id2 = stable_chunk_id("src/main.rs", 1, "fn main() {}");
        assert_ne!(id1, id2);
    }
}
