//! Master key file handling.
//!
//! The key file holds 32 random bytes as URL-safe base64 text. It is created
//! on first run and read on every run after that.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Length of the master key in bytes.
pub const KEY_LEN: usize = 32;

/// Number of hex characters in a key id.
const KEY_ID_HEX_LEN: usize = 16;

/// Context string for deriving the key id.
const KEY_ID_CONTEXT: &str = "custreg 2024-06-01 master key id";

/// The process-wide symmetric key.
pub struct MasterKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

impl MasterKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(bytes.as_mut_slice());
        Self { bytes }
    }

    /// Wrap existing key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short public identifier for this key.
    ///
    /// Derived one-way from the key, so it can be stored next to ciphertext.
    #[must_use]
    pub fn key_id(&self) -> String {
        let derived = blake3::derive_key(KEY_ID_CONTEXT, self.bytes.as_slice());
        let mut id = blake3::Hash::from(derived).to_hex().to_string();
        id.truncate(KEY_ID_HEX_LEN);
        id
    }

    fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.bytes.as_slice()))
    }

    fn decode(path: &Path, encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            URL_SAFE
                .decode(encoded.trim())
                .map_err(|e| Error::key_file(path, format!("not valid base64: {e}")))?,
        );
        if decoded.len() != KEY_LEN {
            return Err(Error::key_file(
                path,
                format!("expected {KEY_LEN} bytes, found {}", decoded.len()),
            ));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }
}

/// Location of the key file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// Create a key store for the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the key file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether the key file already exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the key, creating and persisting a new one if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, written, or decoded.
    pub fn load_or_create(&self) -> Result<MasterKey> {
        if self.exists() {
            return self.load();
        }
        match self.create() {
            Ok(key) => Ok(key),
            // Lost a race with another process creating the same file.
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => self.load(),
            Err(e) => Err(e),
        }
    }

    /// Load an existing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or malformed.
    pub fn load(&self) -> Result<MasterKey> {
        let encoded = Zeroizing::new(
            fs::read_to_string(&self.path)
                .map_err(|e| Error::key_file(&self.path, e.to_string()))?,
        );
        let key = MasterKey::decode(&self.path, &encoded)?;
        debug!(key_id = %key.key_id(), "Loaded key from {}", self.path.display());
        Ok(key)
    }

    fn create(&self) -> Result<MasterKey> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let key = MasterKey::generate();
        let mut options = OpenOptions::new();
        options.create_new(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        let encoded = key.encode();
        if let Err(e) = write_key(&mut file, encoded.as_bytes()) {
            drop(file);
            // A partial key file would fail every later load.
            let _ = fs::remove_file(&self.path);
            return Err(e.into());
        }

        info!(key_id = %key.key_id(), "Created new key at {}", self.path.display());
        Ok(key)
    }
}

fn write_key(out: &mut impl Write, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}
