use std::fmt;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of the full content. The only key either cache tier uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn content_hash(content: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    ContentHash(format!("{:x}", hasher.finalize()))
}
