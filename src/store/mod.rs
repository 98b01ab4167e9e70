//! Persistence collaborator for signed documents.
//!
//! The signing engine writes four kinds of data per signing action: the
//! artifact blob, a document row, a signature row and an audit row. Lookup by
//! content digest is the only query verification depends on.
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`] keeps everything in process (tests, embedding)
//! - [`FsStore`] keeps blobs and a JSON record file under a directory

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::hash::ContentDigest;
use crate::identity::path_component;
use crate::signature::Signature;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Audit action written when a document is signed.
pub const ACTION_SIGNED: &str = "document.signed";
/// Audit action written when an authenticated identity verifies content.
pub const ACTION_VERIFIED: &str = "document.verified";

/// Errors returned by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Lifecycle state of a document row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DocumentStatus {
    Signed,
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub display_name: String,
    pub blob_path: String,
    pub content_digest: ContentDigest,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// The signature row of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub document_id: Uuid,
    pub signature: Signature,
    /// Content digest at sign time. This is the only "signature hash".
    pub digest_at_sign_time: ContentDigest,
    /// Base64 SPKI DER of the signing key. Absent only on legacy rows, whose
    /// key lives in the audit trail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub actor: String,
    pub signed_at: DateTime<Utc>,
}

/// A free-form audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create an audit entry stamped now.
    pub fn new(
        document_id: Option<Uuid>,
        actor: impl Into<String>,
        action: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            actor: actor.into(),
            action: action.into(),
            metadata,
            created_at: Utc::now(),
        }
    }

    /// The `public_key` string in the metadata, if any.
    pub fn public_key(&self) -> Option<&str> {
        self.metadata.get("public_key").and_then(|v| v.as_str())
    }
}

/// Backing store for documents, signatures, audit entries and blobs.
///
/// Implementations must be thread-safe (`Send + Sync`). Each call is one
/// independent write or read; sequencing and compensation belong to the
/// caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store an artifact blob under an opaque path.
    async fn put_blob(&self, path: &str, content: &[u8]) -> Result<(), StoreError>;

    /// Read an artifact blob.
    async fn get_blob(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove an artifact blob. Removing a missing blob is not an error.
    async fn delete_blob(&self, path: &str) -> Result<(), StoreError>;

    /// Insert a document row.
    async fn insert_document(&self, document: &DocumentRecord) -> Result<(), StoreError>;

    /// Remove a document row.
    async fn delete_document(&self, id: Uuid) -> Result<(), StoreError>;

    /// Insert the signature row of a document.
    async fn insert_signature(&self, signature: &SignatureRecord) -> Result<(), StoreError>;

    /// Remove the signature row of a document.
    async fn delete_signature(&self, document_id: Uuid) -> Result<(), StoreError>;

    /// Append an audit entry.
    async fn insert_audit(&self, entry: &AuditRecord) -> Result<(), StoreError>;

    /// All documents with the given content digest, newest first.
    async fn find_documents_by_digest(
        &self,
        digest: &ContentDigest,
    ) -> Result<Vec<DocumentRecord>, StoreError>;

    /// The signature row of a document, if one exists.
    async fn get_signature(&self, document_id: Uuid)
        -> Result<Option<SignatureRecord>, StoreError>;

    /// Audit entries attached to a document, oldest first.
    async fn list_audit_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<AuditRecord>, StoreError>;
}

/// Blob path for an owner's artifact.
///
/// Keyed by document id rather than digest so re-signing the same content
/// never shares (or, on rollback, deletes) another document's blob.
pub fn blob_path(owner_id: &str, document_id: Uuid) -> String {
    format!("{}/{}", path_component(owner_id), document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    #[test]
    fn test_blob_path_is_path_safe() {
        let id = Uuid::new_v4();
        let path = blob_path("../alice", id);
        assert!(!path.contains(".."));
        assert!(path.ends_with(&id.to_string()));

        let long = blob_path(&"o".repeat(500), id);
        let owner = long.split('/').next().unwrap();
        assert!(owner.len() < 255);
    }

    #[test]
    fn test_audit_public_key_lookup() {
        let entry = AuditRecord::new(
            None,
            "alice",
            ACTION_SIGNED,
            serde_json::json!({ "public_key": "AAAA" }),
        );
        assert_eq!(entry.public_key(), Some("AAAA"));

        let bare = AuditRecord::new(None, "alice", ACTION_SIGNED, serde_json::Value::Null);
        assert_eq!(bare.public_key(), None);
    }

    #[test]
    fn test_legacy_signature_row_without_key() {
        let json = serde_json::json!({
            "document_id": Uuid::nil(),
            "signature": "AQID",
            "digest_at_sign_time": hash_bytes(b"x").to_hex(),
            "actor": "alice",
            "signed_at": "2024-01-01T00:00:00Z",
        });
        let record: SignatureRecord = serde_json::from_value(json).unwrap();
        assert!(record.public_key.is_none());
    }
}
