//! Content hashing for the exact-match tier.
//!
//! MD5 is used purely as a fast de-duplication digest for known files. It is
//! not used for anything security sensitive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SentryError};

/// Size of a content digest in bytes (128 bits).
pub const CONTENT_HASH_SIZE: usize = 16;

/// 128-bit digest of the raw bytes of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; CONTENT_HASH_SIZE]);

impl ContentHash {
    /// Hash raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// Get the hash as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hash from its hexadecimal form.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| SentryError::Config(format!("Invalid hex string: {}", e)))?;
        let digest: [u8; CONTENT_HASH_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            SentryError::Config(format!(
                "Content hash must be {} bytes, got {}",
                CONTENT_HASH_SIZE,
                v.len()
            ))
        })?;
        Ok(Self(digest))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // RFC 1321 test suite
        assert_eq!(
            ContentHash::from_bytes(b"").to_hex(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            ContentHash::from_bytes(b"abc").to_hex(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            ContentHash::from_bytes(b"Content A"),
            ContentHash::from_bytes(b"Content B")
        );
    }

    #[test]
    fn test_from_hex() {
        let hash = ContentHash::from_hex("900150983cd24fb0d6963f7d28e17f72").unwrap();
        assert_eq!(hash, ContentHash::from_bytes(b"abc"));

        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("not hex").is_err());
    }
}
