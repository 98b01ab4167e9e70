//! Local key-pair storage keyed by identity.
//!
//! Key pairs never reach the document store. A [`KeyStore`] is injected into
//! the signing session and the verifier instead of being read as ambient
//! state. Writes are last-write-wins: `put` hands back the pair it replaced so
//! callers can warn about it.

use crate::error::{Result, SignError};
use crate::identity::path_component;
use crate::keys::KeyPair;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Get/put/clear access to one key pair per identity.
pub trait KeyStore: Send + Sync {
    /// The stored pair for an identity.
    fn get(&self, identity_id: &str) -> Result<Option<KeyPair>>;

    /// Store a pair, returning the one it replaced.
    fn put(&self, identity_id: &str, keypair: KeyPair) -> Result<Option<KeyPair>>;

    /// Remove the pair for an identity, returning it.
    fn clear(&self, identity_id: &str) -> Result<Option<KeyPair>>;
}

/// Process-local key store.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, KeyPair>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> SignError {
    SignError::KeyStore("key store lock poisoned".to_string())
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, identity_id: &str) -> Result<Option<KeyPair>> {
        let keys = self.keys.read().map_err(poisoned)?;
        Ok(keys.get(identity_id).cloned())
    }

    fn put(&self, identity_id: &str, keypair: KeyPair) -> Result<Option<KeyPair>> {
        let mut keys = self.keys.write().map_err(poisoned)?;
        Ok(keys.insert(identity_id.to_string(), keypair))
    }

    fn clear(&self, identity_id: &str) -> Result<Option<KeyPair>> {
        let mut keys = self.keys.write().map_err(poisoned)?;
        Ok(keys.remove(identity_id))
    }
}

/// One PKCS#8 PEM file per identity under a directory.
///
/// File names come from [`path_component`], so any id maps to a single
/// flat file.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    /// Use `dir`, creating it if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_file(&self, identity_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.pem", path_component(identity_id)))
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, identity_id: &str) -> Result<Option<KeyPair>> {
        let path = self.key_file(identity_id);
        if !path.exists() {
            return Ok(None);
        }
        KeyPair::load_from_file(path).map(Some)
    }

    fn put(&self, identity_id: &str, keypair: KeyPair) -> Result<Option<KeyPair>> {
        let previous = self.get(identity_id).ok().flatten();
        let path = self.key_file(identity_id);
        let tmp = path.with_extension("pem.tmp");
        keypair.save_to_file(&tmp)?;
        fs::rename(&tmp, &path)?;
        Ok(previous)
    }

    fn clear(&self, identity_id: &str) -> Result<Option<KeyPair>> {
        let previous = self.get(identity_id)?;
        if previous.is_some() {
            fs::remove_file(self.key_file(identity_id))?;
        }
        Ok(previous)
    }
}
