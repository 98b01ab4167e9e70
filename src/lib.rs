//! # docsign
//!
//! A document signing library using SHA-256 content digests and
//! RSASSA-PKCS1-v1.5 / SHA-256 signatures over 2048-bit RSA keys.
//!
//! ## Features
//!
//! - **SHA-256 digests** of the exact content bytes as document fingerprints
//! - **RSA PKCS#1 v1.5 signatures**, deterministic and interoperable
//! - **Record resolution**: verify content by looking its signature and key up
//!   from stored records, with a typed report of where the key came from
//! - **Signing sessions** that persist blob, document, signature and audit
//!   rows as one unit, rolling back on failure
//!
//! ## Quick Start
//!
//! ### Sign and Verify
//!
//! ```rust
//! use docsign::{KeyPair, sign, verify};
//!
//! let keypair = KeyPair::generate().unwrap();
//! let private_der = keypair.private_key_der().unwrap();
//! let public_der = keypair.public_key().to_der().unwrap();
//!
//! let signature = sign(b"hello world", &private_der).unwrap();
//! assert!(verify(b"hello world", &signature, &public_der).unwrap());
//! assert!(!verify(b"hello world!", &signature, &public_der).unwrap());
//! ```
//!
//! ### Detached Signatures
//!
//! ```rust
//! use docsign::{KeyPair, Signer, verify_signed_content};
//!
//! let keypair = KeyPair::generate().unwrap();
//! let document = b"Important document content";
//!
//! let signed = Signer::new(&keypair)
//!     .with_signer_id("alice@example.com")
//!     .with_metadata("purpose", "contract")
//!     .sign_bytes(document)
//!     .unwrap();
//!
//! // signed.save("document.sig.json").unwrap();
//! assert!(verify_signed_content(document, &signed).unwrap());
//! ```
//!
//! ### Signing Sessions
//!
//! ```rust
//! use docsign::{
//!     Config, Identity, InMemoryKeyStore, MemoryStore, SigningSession, StaticIdentity,
//!     VerificationOutcome, VerificationRequest,
//! };
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let session = SigningSession::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(InMemoryKeyStore::new()),
//!     Arc::new(StaticIdentity(Identity::new("alice"))),
//!     Config::default(),
//! );
//!
//! session.generate_key_pair().await.unwrap();
//! session.sign_document("contract.txt", b"contract v1").await.unwrap();
//!
//! let report = session
//!     .verify_document(b"contract v1", &VerificationRequest::lookup())
//!     .await
//!     .unwrap();
//! assert_eq!(report.outcome, VerificationOutcome::Verified);
//! # });
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod hash;
pub mod identity;
pub mod keys;
pub mod keystore;
pub mod session;
pub mod signature;
pub mod signer;
pub mod store;
pub mod verifier;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Result, SignError, StorageStep};
pub use hash::{hash_bytes, hash_file, hash_reader, read_content, ContentDigest};
pub use identity::{Anonymous, Identity, IdentityProvider, StaticIdentity};
pub use keys::{KeyPair, PublicKey, KEY_BITS};
pub use keystore::{FileKeyStore, InMemoryKeyStore, KeyStore};
pub use session::{KeyGenOutcome, SignedDocument, SigningSession};
pub use signature::{Signature, SignedContent};
pub use signer::{sign, Signer};
pub use store::{
    AuditRecord, DocumentRecord, DocumentStatus, DocumentStore, FsStore, MemoryStore,
    SignatureRecord, StoreError,
};
pub use verifier::{
    is_valid, verify, verify_signed_content, KeySource, VerificationOutcome, VerificationReport,
    VerificationRequest, Verifier,
};
