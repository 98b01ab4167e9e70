//! The acting identity behind sign and verify requests.

use crate::hash::hash_bytes;
use serde::{Deserialize, Serialize};

/// Longest id stored as plain hex in a path component (128 hex chars).
const MAX_HEX_ID_LEN: usize = 64;

/// A single filesystem-safe path component for an identity id.
///
/// Short ids are hex-encoded so they stay recognizable; longer ids are
/// replaced by `sha256-<digest>` to stay under file name limits. The two
/// forms cannot collide since hex output never contains `-`.
pub fn path_component(id: &str) -> String {
    if id.len() <= MAX_HEX_ID_LEN {
        hex::encode(id.as_bytes())
    } else {
        format!("sha256-{}", hash_bytes(id.as_bytes()).to_hex())
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id; keys the key store and owns documents.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Source of the currently authenticated identity.
pub trait IdentityProvider: Send + Sync {
    /// The authenticated identity, or `None` for anonymous callers.
    fn current_identity(&self) -> Option<Identity>;
}

/// Always reports the same identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        Some(self.0.clone())
    }
}

/// Never authenticated. Read-only verification still works.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_identity(&self) -> Option<Identity> {
        None
    }
}
