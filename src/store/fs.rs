use super::{AuditRecord, DocumentRecord, DocumentStore, SignatureRecord, StoreError};
use crate::hash::ContentDigest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

const RECORDS_FILE: &str = "records.json";
const BLOBS_DIR: &str = "blobs";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default)]
    documents: Vec<DocumentRecord>,
    #[serde(default)]
    signatures: Vec<SignatureRecord>,
    #[serde(default)]
    audit: Vec<AuditRecord>,
}

/// Directory-backed [`DocumentStore`].
///
/// Layout:
/// - `<root>/blobs/<path>` for artifacts
/// - `<root>/records.json` for document, signature and audit rows
///
/// Every record write rewrites `records.json` through a temp file and rename,
/// serialized by an in-process lock. Concurrent processes sharing a root are
/// last-write-wins.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(BLOBS_DIR)).await?;
        tracing::debug!(root = %root.display(), "Opened filesystem document store");
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn blob_file(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(StoreError::Backend(format!("invalid blob path: {}", path)));
        }
        Ok(self.root.join(BLOBS_DIR).join(relative))
    }

    async fn load(&self) -> Result<RecordFile, StoreError> {
        match tokio::fs::read(self.root.join(RECORDS_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecordFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &RecordFile) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.root.join(format!("{}.tmp", RECORDS_FILE));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.root.join(RECORDS_FILE)).await?;
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut RecordFile) -> Result<(), StoreError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        apply(&mut records)?;
        self.save(&records).await
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn put_blob(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let file = self.blob_file(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(file, content).await?;
        Ok(())
    }

    async fn get_blob(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.blob_file(path)?).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("blob {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.blob_file(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_document(&self, document: &DocumentRecord) -> Result<(), StoreError> {
        let document = document.clone();
        self.update(move |records| {
            if records.documents.iter().any(|d| d.id == document.id) {
                return Err(StoreError::Conflict(format!("document {}", document.id)));
            }
            records.documents.push(document);
            Ok(())
        })
        .await
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(move |records| {
            records.documents.retain(|d| d.id != id);
            Ok(())
        })
        .await
    }

    async fn insert_signature(&self, signature: &SignatureRecord) -> Result<(), StoreError> {
        let signature = signature.clone();
        self.update(move |records| {
            let id = signature.document_id;
            if !records.documents.iter().any(|d| d.id == id) {
                return Err(StoreError::NotFound(format!("document {}", id)));
            }
            if records.signatures.iter().any(|s| s.document_id == id) {
                return Err(StoreError::Conflict(format!(
                    "signature for document {}",
                    id
                )));
            }
            records.signatures.push(signature);
            Ok(())
        })
        .await
    }

    async fn delete_signature(&self, document_id: Uuid) -> Result<(), StoreError> {
        self.update(move |records| {
            records.signatures.retain(|s| s.document_id != document_id);
            Ok(())
        })
        .await
    }

    async fn insert_audit(&self, entry: &AuditRecord) -> Result<(), StoreError> {
        let entry = entry.clone();
        self.update(move |records| {
            records.audit.push(entry);
            Ok(())
        })
        .await
    }

    async fn find_documents_by_digest(
        &self,
        digest: &ContentDigest,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        let records = self.load().await?;
        let mut found: Vec<DocumentRecord> = records
            .documents
            .into_iter()
            .filter(|d| &d.content_digest == digest)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get_signature(
        &self,
        document_id: Uuid,
    ) -> Result<Option<SignatureRecord>, StoreError> {
        let records = self.load().await?;
        Ok(records
            .signatures
            .into_iter()
            .find(|s| s.document_id == document_id))
    }

    async fn list_audit_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let records = self.load().await?;
        Ok(records
            .audit
            .into_iter()
            .filter(|e| e.document_id == Some(document_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use crate::store::{DocumentStatus, ACTION_SIGNED};
    use chrono::Utc;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let document = DocumentRecord {
            id: Uuid::new_v4(),
            owner_id: "alice".to_string(),
            display_name: "notes.txt".to_string(),
            blob_path: "616c696365/abc".to_string(),
            content_digest: hash_bytes(b"notes"),
            status: DocumentStatus::Signed,
            created_at: Utc::now(),
        };

        {
            let store = FsStore::open(dir.path()).await.unwrap();
            store.put_blob(&document.blob_path, b"notes").await.unwrap();
            store.insert_document(&document).await.unwrap();
            store
                .insert_audit(&AuditRecord::new(
                    Some(document.id),
                    "alice",
                    ACTION_SIGNED,
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }

        let store = FsStore::open(dir.path()).await.unwrap();
        let found = store
            .find_documents_by_digest(&hash_bytes(b"notes"))
            .await
            .unwrap();
        assert_eq!(found, vec![document.clone()]);
        assert_eq!(store.get_blob(&document.blob_path).await.unwrap(), b"notes");
        assert_eq!(
            store.list_audit_for_document(document.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_rejects_escaping_blob_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        assert!(store.put_blob("../outside", b"x").await.is_err());
        assert!(store.put_blob("/abs", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_document_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        let document = DocumentRecord {
            id: Uuid::new_v4(),
            owner_id: "bob".to_string(),
            display_name: "a".to_string(),
            blob_path: "b/a".to_string(),
            content_digest: hash_bytes(b"a"),
            status: DocumentStatus::Signed,
            created_at: Utc::now(),
        };
        store.insert_document(&document).await.unwrap();
        assert!(matches!(
            store.insert_document(&document).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
