//! Content digests
//!
//! Local files are identified by their MD5 digest, which is what the remote
//! repository reports by default. SHA-256 is available for servers
//! configured with a stronger algorithm.

use docsync_core::domain::DigestAlgorithm;
use sha2::Digest as _;

/// Size of the read buffer used when hashing files
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// Incremental hasher for one of the supported algorithms
pub enum ContentHasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
}

impl ContentHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => ContentHasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => ContentHasher::Sha256(sha2::Sha256::new()),
        }
    }

    pub fn update(&mut self, input: &[u8]) {
        match self {
            ContentHasher::Md5(ctx) => ctx.consume(input),
            ContentHasher::Sha256(hasher) => hasher.update(input),
        }
    }

    /// Consumes the hasher and returns the lowercase hex digest
    pub fn finalize(self) -> String {
        match self {
            ContentHasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            ContentHasher::Sha256(hasher) => format!("{:x}", hasher.finalize()),
        }
    }
}

/// Hashes an in-memory buffer
pub fn digest_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    let mut hasher = ContentHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}
