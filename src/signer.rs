//! Document signing functionality.

use crate::error::Result;
use crate::hash::{hash_bytes, read_content};
use crate::keys::KeyPair;
use crate::signature::{Signature, SignedContent, FORMAT_VERSION};
use chrono::Utc;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Sign raw content with a PKCS#8 DER private key.
///
/// The content is passed to the primitive unhashed; it applies SHA-256
/// itself. PKCS#1 v1.5 is deterministic, so equal inputs give equal
/// signatures.
pub fn sign(content: &[u8], private_key_der: &[u8]) -> Result<Signature> {
    let keypair = KeyPair::from_pkcs8_der(private_key_der)?;
    keypair.sign(content)
}

/// A builder for creating detached signatures.
#[derive(Debug)]
pub struct Signer<'a> {
    keypair: &'a KeyPair,
    signer_id: Option<String>,
    metadata: HashMap<String, String>,
}

impl<'a> Signer<'a> {
    /// Create a new signer with the given keypair.
    pub fn new(keypair: &'a KeyPair) -> Self {
        Self {
            keypair,
            signer_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the signer ID (e.g., email address, name).
    pub fn with_signer_id<S: Into<String>>(mut self, signer_id: S) -> Self {
        self.signer_id = Some(signer_id.into());
        self
    }

    /// Add a metadata key-value pair.
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sign a byte slice.
    pub fn sign_bytes(&self, data: &[u8]) -> Result<SignedContent> {
        let signature = self.keypair.sign(data)?;
        Ok(SignedContent {
            version: FORMAT_VERSION.to_string(),
            content_digest: hash_bytes(data),
            signature,
            public_key: self.keypair.public_key().to_base64()?,
            signer_id: self.signer_id.clone(),
            timestamp: Utc::now(),
            metadata: self.metadata.clone(),
        })
    }

    /// Sign a file.
    pub fn sign_file<P: AsRef<Path>>(&self, path: P) -> Result<SignedContent> {
        let content = read_content(path)?;
        self.sign_bytes(&content)
    }

    /// Sign everything a reader yields.
    ///
    /// RSA signs the whole message, so the reader is drained into memory first.
    pub fn sign_reader<R: Read>(&self, reader: &mut R) -> Result<SignedContent> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        self.sign_bytes(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignError;
    use crate::verifier::verify;

    #[test]
    fn test_sign_is_deterministic() {
        let keypair = KeyPair::generate().unwrap();
        let der = keypair.private_key_der().unwrap();

        let sig1 = sign(b"hello world", &der).unwrap();
        let sig2 = sign(b"hello world", &der).unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1, keypair.sign(b"hello world").unwrap());
    }

    #[test]
    fn test_signs_raw_content_not_digest() {
        let keypair = KeyPair::generate().unwrap();
        let der = keypair.private_key_der().unwrap();
        let public_der = keypair.public_key().to_der().unwrap();
        let content = b"double hashing check";

        let signature = sign(content, &der).unwrap();
        assert!(verify(content, &signature, &public_der).unwrap());

        // A signature over the digest must not pass as one over the content.
        let over_digest = sign(hash_bytes(content).as_bytes(), &der).unwrap();
        assert_ne!(signature, over_digest);
        assert!(!verify(content, &over_digest, &public_der).unwrap());
    }

    #[test]
    fn test_sign_rejects_bad_private_key() {
        let result = sign(b"content", b"definitely not pkcs8");
        assert!(matches!(result, Err(SignError::KeyFormat(_))));
    }

    #[test]
    fn test_sign_with_metadata() {
        let keypair = KeyPair::generate().unwrap();
        let data = b"Test document content";

        let signed = Signer::new(&keypair)
            .with_signer_id("test@example.com")
            .with_metadata("purpose", "testing")
            .with_metadata("version", "1.0")
            .sign_bytes(data)
            .unwrap();

        assert_eq!(signed.signer_id.as_deref(), Some("test@example.com"));
        assert_eq!(signed.metadata.get("purpose"), Some(&"testing".to_string()));
        assert_eq!(signed.content_digest, hash_bytes(data));
        assert_eq!(signed.public_key, keypair.public_key().to_base64().unwrap());
    }

    #[test]
    fn test_sign_reader_matches_bytes() {
        let keypair = KeyPair::generate().unwrap();
        let data = b"streamed document";
        let mut reader = std::io::Cursor::new(data);

        let from_reader = Signer::new(&keypair).sign_reader(&mut reader).unwrap();
        let from_bytes = Signer::new(&keypair).sign_bytes(data).unwrap();
        assert_eq!(from_reader.signature, from_bytes.signature);
    }
}
