//! Structured logging of signing, verification and key events.
//!
//! Every event carries an `event_type` field so log pipelines can filter on
//! it. These are log events only; the persisted audit rows live in
//! [`crate::store::AuditRecord`].

use crate::error::StorageStep;
use crate::hash::ContentDigest;
use uuid::Uuid;

/// Event type names.
pub mod events {
    pub const DOCUMENT_SIGNED: &str = "document.signed";
    pub const DOCUMENT_SIGN_FAILED: &str = "document.sign_failed";
    pub const DOCUMENT_ROLLBACK_FAILED: &str = "document.rollback_failed";
    pub const VERIFICATION_SUCCESS: &str = "verification.success";
    pub const VERIFICATION_FAILURE: &str = "verification.failure";
    pub const KEY_GENERATED: &str = "key.generated";
    pub const KEY_REPLACED: &str = "key.replaced";
}

pub fn log_document_signed(
    actor: &str,
    document_id: Uuid,
    digest: &ContentDigest,
    key_fingerprint: &str,
) {
    tracing::info!(
        event_type = events::DOCUMENT_SIGNED,
        actor = %actor,
        document_id = %document_id,
        content_digest = %digest,
        key_fingerprint = %key_fingerprint,
        "Document signed"
    );
}

pub fn log_sign_failed(
    actor: &str,
    digest: &ContentDigest,
    step: StorageStep,
    artifact_stored: bool,
    error: &str,
) {
    tracing::error!(
        event_type = events::DOCUMENT_SIGN_FAILED,
        actor = %actor,
        content_digest = %digest,
        step = %step,
        artifact_stored,
        error = %error,
        "Signing aborted"
    );
}

pub fn log_rollback_failed(actor: &str, digest: &ContentDigest, what: &str, error: &str) {
    tracing::error!(
        event_type = events::DOCUMENT_ROLLBACK_FAILED,
        actor = %actor,
        content_digest = %digest,
        what = %what,
        error = %error,
        "Could not undo partial signing write"
    );
}

pub fn log_verification_success(digest: &ContentDigest, document_id: Option<Uuid>, source: &str) {
    tracing::info!(
        event_type = events::VERIFICATION_SUCCESS,
        content_digest = %digest,
        document_id = ?document_id,
        key_source = %source,
        "Signature verified"
    );
}

pub fn log_verification_failure(digest: &ContentDigest, reason: &str) {
    tracing::warn!(
        event_type = events::VERIFICATION_FAILURE,
        content_digest = %digest,
        reason = %reason,
        "Signature not verified"
    );
}

pub fn log_key_generated(identity_id: &str, key_fingerprint: &str) {
    tracing::info!(
        event_type = events::KEY_GENERATED,
        identity = %identity_id,
        key_fingerprint = %key_fingerprint,
        "Signing key pair generated"
    );
}

/// A regenerated key orphans signatures that relied on the local key.
pub fn log_key_replaced(identity_id: &str, old_fingerprint: &str, new_fingerprint: &str) {
    tracing::warn!(
        event_type = events::KEY_REPLACED,
        identity = %identity_id,
        old_key_fingerprint = %old_fingerprint,
        new_key_fingerprint = %new_fingerprint,
        "Existing key pair overwritten; documents signed with the old key need their stored public key to verify"
    );
}
