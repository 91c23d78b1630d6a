//! Identity types for Quicksave entities

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Checkpoint identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type CheckpointId = Uuid;

/// Identifier of the report a checkpoint belongs to. Reports are owned by the
/// surrounding reporting subsystem; this crate only references them.
pub type ReportId = Uuid;

/// Identifier of the user who authored a checkpoint.
pub type UserId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for deduplication and integrity verification.
pub type ContentHash = [u8; 32];

/// Raw binary content for codec-encoded state blobs.
pub type RawContent = Vec<u8>;

/// Generate a new UUIDv7 checkpoint id (timestamp-sortable).
pub fn new_checkpoint_id() -> CheckpointId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Lowercase hex form of a content hash, as exposed in checkpoint receipts.
pub fn encode_hash(hash: &ContentHash) -> String {
    hex::encode(hash)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_ids_are_sortable_by_creation() {
        let a = new_checkpoint_id();
        let b = new_checkpoint_id();
        // UUIDv7 embeds the timestamp in the most significant bits.
        assert!(a <= b);
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = compute_content_hash(b"report state");
        let b = compute_content_hash(b"report state");
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_differs_on_different_input() {
        let a = compute_content_hash(b"state one");
        let b = compute_content_hash(b"state two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_hash_is_lowercase_hex() {
        let hash = compute_content_hash(b"x");
        let encoded = encode_hash(&hash);
        assert_eq!(encoded.len(), 64);
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(encoded, encoded.to_lowercase());
    }
}
