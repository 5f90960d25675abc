//! SHA256 hashing for content identity
//!
//! Staged uploads are hashed while they stream to disk so the batch manifest
//! records what was actually written.

use sha2::{Digest, Sha256};

/// Incremental SHA256 over chunks plus a running byte count.
#[derive(Default)]
pub struct StreamingDigest {
    hasher: Sha256,
    bytes: u64,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn chunked_updates_hash_the_whole_stream() {
        let mut digest = StreamingDigest::new();
        digest.update(b"hello ");
        digest.update(b"world");
        assert_eq!(digest.bytes(), 11);
        assert_eq!(digest.finish(), HELLO_WORLD);
    }

    #[test]
    fn empty_stream_has_the_empty_digest() {
        let digest = StreamingDigest::new();
        assert_eq!(digest.bytes(), 0);
        assert_eq!(
            digest.finish(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
