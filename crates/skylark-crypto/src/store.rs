//! Key-material persistence
//!
//! Two scoped files per session identity: the fingerprint as decimal text
//! and the raw shared-secret bytes. A cold start with missing or corrupt
//! files is a valid, expected condition and loads as "no cached key"
//! rather than an error. Writes happen only after mutual fingerprint
//! verification has succeeded, so the files never hold unverified
//! material.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::Result;
use crate::SECRET_LEN;

/// Key material loaded from a [`KeyStore`].
pub struct CachedKey {
    /// Persisted fingerprint, `0` when absent or unreadable.
    pub fingerprint: i64,
    /// Persisted shared secret, absent on a cold start.
    pub secret: Option<Zeroizing<Vec<u8>>>,
}

impl CachedKey {
    /// True when both fingerprint and secret were recovered.
    pub fn is_present(&self) -> bool {
        self.fingerprint != 0 && self.secret.is_some()
    }
}

/// File-backed store for one session's key material.
#[derive(Clone, Debug)]
pub struct KeyStore {
    fingerprint_path: PathBuf,
    secret_path: PathBuf,
}

impl KeyStore {
    /// Store over two explicit file paths.
    pub fn new(fingerprint_path: impl Into<PathBuf>, secret_path: impl Into<PathBuf>) -> Self {
        Self {
            fingerprint_path: fingerprint_path.into(),
            secret_path: secret_path.into(),
        }
    }

    /// Store for a named session identity under `dir`.
    ///
    /// Paths are `key_print_{name}.txt` and `shared_key_{name}.bin`, so
    /// several cached identities can coexist in one directory.
    pub fn for_session(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            fingerprint_path: dir.join(format!("key_print_{name}.txt")),
            secret_path: dir.join(format!("shared_key_{name}.bin")),
        }
    }

    /// Path of the fingerprint file.
    pub fn fingerprint_path(&self) -> &Path {
        &self.fingerprint_path
    }

    /// Path of the shared-secret file.
    pub fn secret_path(&self) -> &Path {
        &self.secret_path
    }

    /// Load whatever key material the files hold.
    ///
    /// Never fails: a missing or unparseable fingerprint loads as `0`, a
    /// missing secret file loads as absent.
    pub fn load(&self) -> CachedKey {
        let fingerprint = match fs::read_to_string(&self.fingerprint_path) {
            Ok(text) => text.trim().parse::<i64>().unwrap_or_else(|_| {
                warn!(path = %self.fingerprint_path.display(), "Corrupt fingerprint file, treating as cold start");
                0
            }),
            Err(_) => 0,
        };

        let secret = match fs::read(&self.secret_path) {
            Ok(bytes) if bytes.len() == SECRET_LEN => Some(Zeroizing::new(bytes)),
            Ok(bytes) if !bytes.is_empty() => {
                warn!(
                    path = %self.secret_path.display(),
                    len = bytes.len(),
                    "Unexpected secret length, treating as cold start"
                );
                None
            }
            _ => None,
        };

        debug!(
            fingerprint,
            secret_present = secret.is_some(),
            "Loaded key store"
        );
        CachedKey {
            fingerprint,
            secret,
        }
    }

    /// Persist a verified fingerprint and shared secret.
    pub fn save(&self, fingerprint: i64, secret: &[u8]) -> Result<()> {
        if let Some(parent) = self.fingerprint_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = self.secret_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.fingerprint_path, fingerprint.to_string())?;
        fs::write(&self.secret_path, secret)?;
        debug!(fingerprint, "Persisted key material");
        Ok(())
    }

    /// Delete both files, ignoring ones that do not exist.
    pub fn clear(&self) -> Result<()> {
        for path in [&self.fingerprint_path, &self.secret_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
