//! Error types for the docsign library.

use crate::store::StoreError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// The persistence step a signing action was on when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStep {
    /// Uploading the artifact blob.
    Upload,
    /// Inserting the document row.
    Document,
    /// Inserting the signature row.
    Signature,
    /// Inserting the audit row.
    Audit,
}

impl fmt::Display for StorageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageStep::Upload => "artifact upload",
            StorageStep::Document => "document record insert",
            StorageStep::Signature => "signature record insert",
            StorageStep::Audit => "audit record insert",
        };
        f.write_str(name)
    }
}

/// The main error type for docsign operations.
#[derive(Error, Debug)]
pub enum SignError {
    /// Error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with base64 encoding/decoding.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Key material is not a valid RSA PKCS#8 / SPKI encoding.
    #[error("Invalid key: {0}")]
    KeyFormat(String),

    /// The cryptographic primitive could not be performed.
    #[error("Crypto provider error: {0}")]
    CryptoProvider(String),

    /// Invalid digest or record format.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// No signed record matches the content digest.
    #[error("No signed record found for digest {digest}")]
    NotFound { digest: String },

    /// A signed record exists but its public key cannot be recovered.
    #[error("Public key not found for signed document {document_id}")]
    IncompleteRecord { document_id: Uuid },

    /// The signature was evaluated and did not match.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// The acting identity has no key pair in the key store.
    #[error("No key pair stored for identity {0}")]
    NoKeyPair(String),

    /// The operation writes records and needs an authenticated identity.
    #[error("No authenticated identity")]
    Unauthenticated,

    /// The owner already signed content with this digest.
    #[error("Content already signed as document {document_id}")]
    AlreadySigned { document_id: Uuid },

    /// Key store backend failure.
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// Persistence failure outside a signing sequence.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A step of the signing sequence failed.
    #[error("Signing aborted at {step} (artifact stored: {artifact_stored}): {source}")]
    Storage {
        step: StorageStep,
        artifact_stored: bool,
        #[source]
        source: StoreError,
    },

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for docsign operations.
pub type Result<T> = std::result::Result<T, SignError>;
