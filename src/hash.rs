//! SHA-256 content digests for document signing.

use crate::error::{Result, SignError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// The size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// A SHA-256 digest of the exact content bytes.
///
/// The hex form is the canonical fingerprint used to look documents up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; HASH_SIZE]);

impl ContentDigest {
    /// Create a digest from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the digest.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Encode the digest as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode a digest from a hexadecimal string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| SignError::InvalidFormat(format!("Invalid digest hex: {}", e)))?;
        let arr: [u8; HASH_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            SignError::InvalidFormat(format!(
                "Invalid digest length: expected {}, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of a byte slice.
pub fn hash_bytes(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// Compute the SHA-256 digest of a file using streaming.
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<ContentDigest> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    hash_reader(&mut reader)
}

/// Compute the SHA-256 digest from any reader using streaming.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<ContentDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentDigest(hasher.finalize().into()))
}

/// Read a file's content exactly as stored.
///
/// Sign and verify both go through here so the bytes that were hashed at
/// sign time are the bytes hashed at verify time. No decoding or line-ending
/// conversion is applied.
pub fn read_content<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes() {
        let data = b"Hello, World!";
        let hash = hash_bytes(data);

        let hash2 = hash_bytes(data);
        assert_eq!(hash, hash2);

        let hash3 = hash_bytes(b"Different data");
        assert_ne!(hash, hash3);
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            hash_bytes(b"hello world").to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_whitespace_changes_digest() {
        assert_ne!(hash_bytes(b"contract v1"), hash_bytes(b"contract v1 "));
        assert_ne!(hash_bytes(b"line\n"), hash_bytes(b"line\r\n"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = hash_bytes(b"Test");
        let hex = hash.to_hex();

        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ContentDigest::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ContentDigest::from_hex("not hex").is_err());
        assert!(ContentDigest::from_hex("abcd").is_err());
    }

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let mut cursor = std::io::Cursor::new(&data);
        assert_eq!(hash_reader(&mut cursor).unwrap(), hash_bytes(&data));
    }

    #[test]
    fn test_serde_as_hex() {
        let hash = hash_bytes(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
