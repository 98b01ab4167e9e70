use super::{AuditRecord, DocumentRecord, DocumentStore, SignatureRecord, StoreError};
use crate::hash::ContentDigest;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    blobs: HashMap<String, Vec<u8>>,
    documents: HashMap<Uuid, DocumentRecord>,
    signatures: HashMap<Uuid, SignatureRecord>,
    audit: Vec<AuditRecord>,
}

/// In-process [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.tables.read().await.blobs.len()
    }

    /// Number of document rows.
    pub async fn document_count(&self) -> usize {
        self.tables.read().await.documents.len()
    }

    /// Number of signature rows.
    pub async fn signature_count(&self) -> usize {
        self.tables.read().await.signatures.len()
    }

    /// Every audit entry, oldest first.
    pub async fn audit_entries(&self) -> Vec<AuditRecord> {
        self.tables.read().await.audit.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put_blob(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.blobs.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("blob {}", path)))
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        self.tables.write().await.blobs.remove(path);
        Ok(())
    }

    async fn insert_document(&self, document: &DocumentRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(format!("document {}", document.id)));
        }
        tables.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.documents.remove(&id);
        Ok(())
    }

    async fn insert_signature(&self, signature: &SignatureRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(&signature.document_id) {
            return Err(StoreError::NotFound(format!(
                "document {}",
                signature.document_id
            )));
        }
        if tables.signatures.contains_key(&signature.document_id) {
            return Err(StoreError::Conflict(format!(
                "signature for document {}",
                signature.document_id
            )));
        }
        tables
            .signatures
            .insert(signature.document_id, signature.clone());
        Ok(())
    }

    async fn delete_signature(&self, document_id: Uuid) -> Result<(), StoreError> {
        self.tables.write().await.signatures.remove(&document_id);
        Ok(())
    }

    async fn insert_audit(&self, entry: &AuditRecord) -> Result<(), StoreError> {
        self.tables.write().await.audit.push(entry.clone());
        Ok(())
    }

    async fn find_documents_by_digest(
        &self,
        digest: &ContentDigest,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<DocumentRecord> = tables
            .documents
            .values()
            .filter(|d| &d.content_digest == digest)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get_signature(
        &self,
        document_id: Uuid,
    ) -> Result<Option<SignatureRecord>, StoreError> {
        Ok(self.tables.read().await.signatures.get(&document_id).cloned())
    }

    async fn list_audit_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .filter(|e| e.document_id == Some(document_id))
            .cloned()
            .collect())
    }
}
