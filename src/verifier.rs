//! Signature verification and signed-record resolution.

use crate::audit;
use crate::error::{Result, SignError};
use crate::hash::{hash_bytes, ContentDigest};
use crate::identity::Identity;
use crate::keys::PublicKey;
use crate::keystore::KeyStore;
use crate::signature::{Signature, SignedContent};
use crate::store::{AuditRecord, DocumentRecord, DocumentStore, SignatureRecord, ACTION_VERIFIED};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::VerifyingKey;
use rsa::signature::Verifier as _;
use rsa::RsaPublicKey;
use serde::Serialize;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Check a signature over raw content with an SPKI DER public key.
///
/// Returns `Ok(false)` for any mismatch. Errors only when the signature or
/// key cannot be decoded at all.
pub fn verify(content: &[u8], signature: &Signature, public_key_der: &[u8]) -> Result<bool> {
    let public_key = PublicKey::from_der(public_key_der)?;
    public_key.verify(content, signature)
}

/// [`verify`], with malformed input reported as not verified.
pub fn is_valid(content: &[u8], signature: &Signature, public_key_der: &[u8]) -> bool {
    verify(content, signature, public_key_der).unwrap_or(false)
}

pub(crate) fn verify_with_key(
    content: &[u8],
    signature: &Signature,
    public_key: &RsaPublicKey,
) -> Result<bool> {
    let bytes = signature.to_bytes()?;
    let signature = rsa::pkcs1v15::Signature::try_from(bytes.as_slice())
        .map_err(|e| SignError::InvalidFormat(format!("Invalid signature bytes: {}", e)))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    Ok(verifying_key.verify(content, &signature).is_ok())
}

/// Check pasted key text; anything unparseable is simply not verified.
fn check_with_text(content: &[u8], signature: &Signature, public_key: &str) -> bool {
    PublicKey::parse(public_key)
        .and_then(|key| key.verify(content, signature))
        .unwrap_or(false)
}

/// Check content against a detached signature document.
pub fn verify_signed_content(content: &[u8], signed: &SignedContent) -> Result<bool> {
    if hash_bytes(content) != signed.content_digest {
        return Ok(false);
    }
    let public_key = PublicKey::from_base64(&signed.public_key)?;
    public_key.verify(content, &signed.signature)
}

/// Where the public key used for a verification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Supplied by the caller.
    Manual,
    /// The current identity's own key pair from the local key store.
    LocalKeyStore,
    /// The `public_key` column of the signature row.
    SignatureRecord,
    /// Metadata of the signing action's audit entry.
    AuditTrail,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeySource::Manual => "manual",
            KeySource::LocalKeyStore => "local_key_store",
            KeySource::SignatureRecord => "signature_record",
            KeySource::AuditTrail => "audit_trail",
        };
        f.write_str(name)
    }
}

/// Result of resolving and checking content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The signature matches the content and key.
    Verified,
    /// No signed record exists for the content digest.
    NotSigned,
    /// A signed record exists but no public key could be recovered.
    KeyNotFound,
    /// The signature was checked and does not match.
    SignatureInvalid,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationOutcome::Verified => "verified",
            VerificationOutcome::NotSigned => "not_signed",
            VerificationOutcome::KeyNotFound => "key_not_found",
            VerificationOutcome::SignatureInvalid => "signature_invalid",
        };
        f.write_str(name)
    }
}

/// What a caller supplied alongside the content.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    pub signature: Option<Signature>,
    /// PEM or base64 SPKI DER.
    pub public_key: Option<String>,
}

impl VerificationRequest {
    /// Look everything up from stored records.
    pub fn lookup() -> Self {
        Self::default()
    }

    /// Check against an explicit signature and key; no lookup happens.
    pub fn manual<S: Into<String>>(signature: Signature, public_key: S) -> Self {
        Self {
            signature: Some(signature),
            public_key: Some(public_key.into()),
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn with_public_key<S: Into<String>>(mut self, public_key: S) -> Self {
        self.public_key = Some(public_key.into());
        self
    }
}

/// Outcome of [`Verifier::verify_content`] with the record it was judged on.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub digest: ContentDigest,
    pub outcome: VerificationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_source: Option<KeySource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl VerificationReport {
    fn bare(digest: ContentDigest, outcome: VerificationOutcome) -> Self {
        Self {
            digest,
            outcome,
            key_source: None,
            document_id: None,
            signer: None,
            signed_at: None,
        }
    }

    fn for_record(
        digest: ContentDigest,
        outcome: VerificationOutcome,
        key_source: Option<KeySource>,
        record: &SignatureRecord,
    ) -> Self {
        Self {
            digest,
            outcome,
            key_source,
            document_id: Some(record.document_id),
            signer: Some(record.actor.clone()),
            signed_at: Some(record.signed_at),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.outcome == VerificationOutcome::Verified
    }

    /// Convert anything but [`VerificationOutcome::Verified`] into its error.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            VerificationOutcome::Verified => Ok(self),
            VerificationOutcome::NotSigned => Err(SignError::NotFound {
                digest: self.digest.to_hex(),
            }),
            VerificationOutcome::KeyNotFound => Err(SignError::IncompleteRecord {
                document_id: self.document_id.unwrap_or_else(Uuid::nil),
            }),
            VerificationOutcome::SignatureInvalid => Err(SignError::VerificationFailed(format!(
                "signature does not match content {}",
                self.digest
            ))),
        }
    }
}

/// Resolves signature and key material for content and checks it.
///
/// Resolution order for the public key:
/// 1. the caller's key ([`KeySource::Manual`]); when both signature and key
///    are supplied no lookup happens at all
/// 2. the current identity's local key pair, for records that identity signed
/// 3. the key stored on the signature row
/// 4. the key recorded in the signing action's audit metadata
///
/// A caller-supplied key is the only key tried. Otherwise every recoverable
/// key is tried in order and the first that verifies is reported.
pub struct Verifier {
    store: Arc<dyn DocumentStore>,
    key_store: Arc<dyn KeyStore>,
    audit_verifications: bool,
}

impl Verifier {
    pub fn new(store: Arc<dyn DocumentStore>, key_store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            key_store,
            audit_verifications: false,
        }
    }

    /// Write an audit row for verifications made by an authenticated identity.
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_verifications = enabled;
        self
    }

    /// Resolve and check `content`.
    ///
    /// Store failures are errors: the check could not be evaluated. Bad
    /// signature or key encodings are not; they report
    /// [`VerificationOutcome::SignatureInvalid`].
    pub async fn verify_content(
        &self,
        content: &[u8],
        request: &VerificationRequest,
        identity: Option<&Identity>,
    ) -> Result<VerificationReport> {
        let digest = hash_bytes(content);
        let report = self.resolve(content, digest, request, identity).await?;

        match report.outcome {
            VerificationOutcome::Verified => audit::log_verification_success(
                &digest,
                report.document_id,
                &report
                    .key_source
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            ),
            outcome => audit::log_verification_failure(&digest, &outcome.to_string()),
        }

        if let (true, Some(identity)) = (self.audit_verifications, identity) {
            self.record_verification(identity, &report).await;
        }

        Ok(report)
    }

    async fn resolve(
        &self,
        content: &[u8],
        digest: ContentDigest,
        request: &VerificationRequest,
        identity: Option<&Identity>,
    ) -> Result<VerificationReport> {
        if let (Some(signature), Some(public_key)) = (&request.signature, &request.public_key) {
            let outcome = if check_with_text(content, signature, public_key) {
                VerificationOutcome::Verified
            } else {
                VerificationOutcome::SignatureInvalid
            };
            let mut report = VerificationReport::bare(digest, outcome);
            report.key_source = Some(KeySource::Manual);
            return Ok(report);
        }

        let documents = self.store.find_documents_by_digest(&digest).await?;
        tracing::debug!(
            content_digest = %digest,
            candidates = documents.len(),
            "Looked up signed records"
        );

        let mut rejected: Option<VerificationReport> = None;
        let mut keyless: Option<VerificationReport> = None;

        for document in &documents {
            let Some(record) = self.store.get_signature(document.id).await? else {
                tracing::debug!(document_id = %document.id, "Document has no signature row");
                continue;
            };
            let signature = request.signature.as_ref().unwrap_or(&record.signature);
            let candidates = self.candidate_keys(document, &record, request, identity).await?;

            if candidates.is_empty() {
                keyless.get_or_insert_with(|| {
                    VerificationReport::for_record(
                        digest,
                        VerificationOutcome::KeyNotFound,
                        None,
                        &record,
                    )
                });
                continue;
            }

            for (source, key) in &candidates {
                if check_with_text(content, signature, key) {
                    return Ok(VerificationReport::for_record(
                        digest,
                        VerificationOutcome::Verified,
                        Some(*source),
                        &record,
                    ));
                }
            }

            rejected.get_or_insert_with(|| {
                VerificationReport::for_record(
                    digest,
                    VerificationOutcome::SignatureInvalid,
                    candidates.first().map(|(source, _)| *source),
                    &record,
                )
            });
        }

        Ok(rejected
            .or(keyless)
            .unwrap_or_else(|| VerificationReport::bare(digest, VerificationOutcome::NotSigned)))
    }

    /// Public keys to try for one record, in resolution order.
    async fn candidate_keys(
        &self,
        document: &DocumentRecord,
        record: &SignatureRecord,
        request: &VerificationRequest,
        identity: Option<&Identity>,
    ) -> Result<Vec<(KeySource, String)>> {
        if let Some(key) = &request.public_key {
            return Ok(vec![(KeySource::Manual, key.clone())]);
        }

        let mut keys = Vec::new();

        if let Some(identity) = identity.filter(|i| i.id == record.actor) {
            if let Some(key) = self.local_public_key(identity) {
                keys.push((KeySource::LocalKeyStore, key));
            }
        }

        if let Some(key) = &record.public_key {
            keys.push((KeySource::SignatureRecord, key.clone()));
        }

        let audit_key = self
            .store
            .list_audit_for_document(document.id)
            .await?
            .iter()
            .find_map(|entry| entry.public_key().map(str::to_string));
        if let Some(key) = audit_key {
            keys.push((KeySource::AuditTrail, key));
        }

        keys.dedup_by(|a, b| a.1 == b.1);
        Ok(keys)
    }

    /// The identity's own public key, skipped when the local pair is unreadable.
    fn local_public_key(&self, identity: &Identity) -> Option<String> {
        let encoded = self
            .key_store
            .get(&identity.id)
            .and_then(|pair| pair.map(|p| p.public_key().to_base64()).transpose());
        match encoded {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    identity = %identity.id,
                    error = %e,
                    "Local key pair unreadable, skipping it as a key source"
                );
                None
            }
        }
    }

    async fn record_verification(&self, identity: &Identity, report: &VerificationReport) {
        let entry = AuditRecord::new(
            report.document_id,
            identity.id.clone(),
            ACTION_VERIFIED,
            serde_json::json!({
                "content_digest": report.digest.to_hex(),
                "outcome": report.outcome,
                "key_source": report.key_source,
            }),
        );
        if let Err(e) = self.store.insert_audit(&entry).await {
            tracing::warn!(
                actor = %identity.id,
                error = %e,
                "Failed to record verification audit entry"
            );
        }
    }
}
