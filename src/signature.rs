//! Signature values and detached signature documents.

use crate::error::Result;
use crate::hash::ContentDigest;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// The current version of the detached signature format.
pub const FORMAT_VERSION: &str = "1.0";

/// A base64-encoded RSASSA-PKCS1-v1.5 / SHA-256 signature.
///
/// Stored as text; decoding happens only when the signature is checked, so a
/// garbage value survives until verification reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Wrap already-encoded base64 text without validating it.
    pub fn from_base64<S: Into<String>>(s: S) -> Self {
        Self(s.into().trim().to_string())
    }

    /// The base64 text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the raw signature bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(base64::engine::general_purpose::STANDARD.decode(&self.0)?)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A self-contained signature over some content.
///
/// Written next to a file as a detached `.sig.json` document; carries
/// everything needed to check the content without the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedContent {
    /// Format version for compatibility.
    pub version: String,

    /// SHA-256 of the signed content.
    pub content_digest: ContentDigest,

    /// The signature over the raw content.
    pub signature: Signature,

    /// The public key that created this signature (base64 DER).
    pub public_key: String,

    /// Optional identifier for the signer (e.g., email, name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<String>,

    /// Timestamp when the signature was created.
    pub timestamp: DateTime<Utc>,

    /// Optional additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SignedContent {
    /// Save the signature to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a signature from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a signature from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the signature to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_bytes() {
        let sig = Signature::from_bytes(&[1, 2, 3, 255]);
        assert_eq!(sig.as_str(), "AQID/w==");
        assert_eq!(sig.to_bytes().unwrap(), vec![1, 2, 3, 255]);
    }

    #[test]
    fn test_garbage_base64_fails_on_decode() {
        let sig = Signature::from_base64("%%% not base64 %%%");
        assert!(sig.to_bytes().is_err());
    }

    #[test]
    fn test_signature_serializes_as_string() {
        let sig = Signature::from_base64("AQID/w==");
        assert_eq!(serde_json::to_string(&sig).unwrap(), "\"AQID/w==\"");
    }
}
