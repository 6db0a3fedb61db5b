//! Core data model: archives, their resources and header tables.

pub mod archive;
pub mod header;
pub mod resource;

use sha2::{Digest, Sha256};

/// SHA-256 digest of some content.
pub type ContentHash = [u8; 32];

/// Hash `bytes` with SHA-256.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    Sha256::digest(bytes).into()
}

/// Lowercase hex rendering of a digest, for display.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
