//! Signing sessions: key generation and the sign-and-persist sequence.

use crate::audit;
use crate::config::Config;
use crate::error::{Result, SignError, StorageStep};
use crate::hash::{hash_bytes, ContentDigest};
use crate::identity::{Identity, IdentityProvider};
use crate::keys::{KeyPair, PublicKey};
use crate::keystore::KeyStore;
use crate::store::{
    blob_path, AuditRecord, DocumentRecord, DocumentStatus, DocumentStore, SignatureRecord,
    StoreError, ACTION_SIGNED,
};
use crate::verifier::{VerificationReport, VerificationRequest, Verifier};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Result of [`SigningSession::generate_key_pair`].
#[derive(Debug, Clone)]
pub struct KeyGenOutcome {
    pub public_key: PublicKey,
    pub fingerprint: String,
    /// A previous pair for the identity was overwritten.
    pub replaced_existing: bool,
}

/// Rows written by a successful [`SigningSession::sign_document`].
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub document: DocumentRecord,
    pub signature: SignatureRecord,
    pub audit: AuditRecord,
}

/// Which writes of a signing sequence have landed.
#[derive(Debug, Default)]
struct Written {
    blob: bool,
    document: bool,
    signature: bool,
}

/// Binds the crypto core to a store, a key store and an identity.
///
/// One `sign_document` call writes exactly one blob, one document row, one
/// signature row and one audit row, in that order; each write needs the
/// previous one to have succeeded.
pub struct SigningSession {
    store: Arc<dyn DocumentStore>,
    key_store: Arc<dyn KeyStore>,
    identity: Arc<dyn IdentityProvider>,
    config: Config,
}

impl SigningSession {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key_store: Arc<dyn KeyStore>,
        identity: Arc<dyn IdentityProvider>,
        config: Config,
    ) -> Self {
        Self {
            store,
            key_store,
            identity,
            config,
        }
    }

    fn require_identity(&self) -> Result<Identity> {
        self.identity
            .current_identity()
            .ok_or(SignError::Unauthenticated)
    }

    /// Whether the current identity already has a key pair.
    ///
    /// Callers should warn before [`Self::generate_key_pair`] when this is
    /// true: regenerating discards the old private key.
    pub fn has_key_pair(&self) -> Result<bool> {
        let identity = self.require_identity()?;
        Ok(self.key_store.get(&identity.id)?.is_some())
    }

    /// Generate and store a fresh key pair for the current identity.
    ///
    /// Overwrites any existing pair (last write wins).
    pub async fn generate_key_pair(&self) -> Result<KeyGenOutcome> {
        let identity = self.require_identity()?;

        let keypair = tokio::task::spawn_blocking(KeyPair::generate)
            .await
            .map_err(|e| SignError::CryptoProvider(format!("key generation task failed: {}", e)))??;
        let public_key = keypair.public_key();
        let fingerprint = public_key.fingerprint()?;

        let previous = self.key_store.put(&identity.id, keypair)?;
        if let Some(previous) = &previous {
            let old_fingerprint = previous.public_key().fingerprint()?;
            audit::log_key_replaced(&identity.id, &old_fingerprint, &fingerprint);
        }
        audit::log_key_generated(&identity.id, &fingerprint);

        Ok(KeyGenOutcome {
            public_key,
            fingerprint,
            replaced_existing: previous.is_some(),
        })
    }

    /// The current identity's public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        let identity = self.require_identity()?;
        let keypair = self
            .key_store
            .get(&identity.id)?
            .ok_or_else(|| SignError::NoKeyPair(identity.id.clone()))?;
        Ok(keypair.public_key())
    }

    /// Hash, sign and persist `content` as a document named `display_name`.
    pub async fn sign_document(&self, display_name: &str, content: &[u8]) -> Result<SignedDocument> {
        let identity = self.require_identity()?;
        let keypair = self
            .key_store
            .get(&identity.id)?
            .ok_or_else(|| SignError::NoKeyPair(identity.id.clone()))?;

        let digest = hash_bytes(content);

        if !self.config.allow_resign {
            if let Some(document_id) = self.signed_by(&identity, &digest).await? {
                return Err(SignError::AlreadySigned { document_id });
            }
        }

        let public_key = keypair.public_key();
        let public_key_b64 = public_key.to_base64()?;
        let fingerprint = public_key.fingerprint()?;

        let message = content.to_vec();
        let signature = tokio::task::spawn_blocking(move || keypair.sign(&message))
            .await
            .map_err(|e| SignError::CryptoProvider(format!("signing task failed: {}", e)))??;

        let now = Utc::now();
        let document_id = Uuid::new_v4();
        let document = DocumentRecord {
            id: document_id,
            owner_id: identity.id.clone(),
            display_name: display_name.to_string(),
            blob_path: blob_path(&identity.id, document_id),
            content_digest: digest,
            status: DocumentStatus::Signed,
            created_at: now,
        };
        let signature = SignatureRecord {
            document_id: document.id,
            signature,
            digest_at_sign_time: digest,
            public_key: Some(public_key_b64.clone()),
            actor: identity.id.clone(),
            signed_at: now,
        };
        let audit_entry = AuditRecord::new(
            Some(document.id),
            identity.id.clone(),
            ACTION_SIGNED,
            serde_json::json!({
                "display_name": display_name,
                "content_digest": digest.to_hex(),
                "public_key": public_key_b64,
                "key_fingerprint": fingerprint,
                "email": identity.email,
            }),
        );

        let mut written = Written::default();

        if let Err(e) = self.store.put_blob(&document.blob_path, content).await {
            return Err(self
                .abort(&identity, &document, &written, StorageStep::Upload, e)
                .await);
        }
        written.blob = true;

        if let Err(e) = self.store.insert_document(&document).await {
            return Err(self
                .abort(&identity, &document, &written, StorageStep::Document, e)
                .await);
        }
        written.document = true;

        if let Err(e) = self.store.insert_signature(&signature).await {
            return Err(self
                .abort(&identity, &document, &written, StorageStep::Signature, e)
                .await);
        }
        written.signature = true;

        if let Err(e) = self.store.insert_audit(&audit_entry).await {
            return Err(self
                .abort(&identity, &document, &written, StorageStep::Audit, e)
                .await);
        }

        audit::log_document_signed(&identity.id, document.id, &digest, &fingerprint);

        Ok(SignedDocument {
            document,
            signature,
            audit: audit_entry,
        })
    }

    /// The owner's existing signed document for `digest`.
    ///
    /// A document row without a signature row is the leftover of a failed
    /// sequence and does not count.
    async fn signed_by(&self, identity: &Identity, digest: &ContentDigest) -> Result<Option<Uuid>> {
        let existing = self.store.find_documents_by_digest(digest).await?;
        for document in existing.iter().filter(|d| d.owner_id == identity.id) {
            if self.store.get_signature(document.id).await?.is_some() {
                return Ok(Some(document.id));
            }
        }
        Ok(None)
    }

    /// Stop a failed sequence, undoing earlier writes when transactional.
    async fn abort(
        &self,
        identity: &Identity,
        document: &DocumentRecord,
        written: &Written,
        step: StorageStep,
        source: StoreError,
    ) -> SignError {
        let digest = document.content_digest;
        let mut artifact_stored = written.blob;

        if self.config.transactional {
            if written.signature {
                if let Err(e) = self.store.delete_signature(document.id).await {
                    self.rollback_failed(identity, &digest, "signature row", e);
                }
            }
            if written.document {
                if let Err(e) = self.store.delete_document(document.id).await {
                    self.rollback_failed(identity, &digest, "document row", e);
                }
            }
            if written.blob {
                match self.store.delete_blob(&document.blob_path).await {
                    Ok(()) => artifact_stored = false,
                    Err(e) => self.rollback_failed(identity, &digest, "artifact blob", e),
                }
            }
        }

        audit::log_sign_failed(
            &identity.id,
            &digest,
            step,
            artifact_stored,
            &source.to_string(),
        );

        SignError::Storage {
            step,
            artifact_stored,
            source,
        }
    }

    fn rollback_failed(&self, identity: &Identity, digest: &ContentDigest, what: &str, e: StoreError) {
        audit::log_rollback_failed(&identity.id, digest, what, &e.to_string());
    }

    /// A verifier sharing this session's store and key store.
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.store.clone(), self.key_store.clone())
            .with_audit(self.config.audit_verifications)
    }

    /// Verify `content` as the current identity, if any.
    pub async fn verify_document(
        &self,
        content: &[u8],
        request: &VerificationRequest,
    ) -> Result<VerificationReport> {
        let identity = self.identity.current_identity();
        self.verifier()
            .verify_content(content, request, identity.as_ref())
            .await
    }
}
