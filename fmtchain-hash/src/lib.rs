//! Hashing primitives shared by the fmtchain crates.

use sha2::{Digest, Sha256};

/// Incremental sha256 over a sequence of length-prefixed chunks.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` from colliding.
#[derive(Debug, Clone, Default)]
pub struct ChunkHasher {
    inner: Sha256,
    bytes: usize,
}

impl ChunkHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&mut self, bytes: &[u8]) -> &mut Self {
        let len = bytes.len() as u64;
        self.inner.update(len.to_le_bytes());
        self.inner.update(bytes);
        self.bytes += 8 + bytes.len();
        self
    }

    /// Total number of bytes fed so far, prefixes included.
    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finish_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chunk_hashes_its_length_prefix() {
        let mut h = ChunkHasher::new();
        h.chunk(b"");
        assert_eq!(
            h.finish_hex(),
            "af5570f5a1810b7af78caf4bc70a660f0df51e42baf91d4de5b2328de0e83dfc"
        );
    }

    #[test]
    fn chunk_boundaries_change_the_hash() {
        let mut a = ChunkHasher::new();
        a.chunk(b"ab").chunk(b"c");
        let mut b = ChunkHasher::new();
        b.chunk(b"a").chunk(b"bc");
        assert_ne!(a.finish_hex(), b.finish_hex());
    }

    #[test]
    fn chunk_hasher_counts_prefixed_bytes() {
        let mut h = ChunkHasher::new();
        assert!(h.is_empty());
        h.chunk(b"xyz");
        assert_eq!(h.len(), 11);
    }
}
