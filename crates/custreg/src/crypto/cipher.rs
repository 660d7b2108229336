//! Field encryption and email fingerprints.
//!
//! Uses XChaCha20-Poly1305 with a random 24-byte nonce and the key id as
//! associated data. Key: 32 bytes derived from the master key.
//!
//! Token wire format (URL-safe base64 of):
//!   [ version (1 byte) | nonce (24 bytes) | ciphertext + tag ]
//!
//! Encryption is probabilistic, so tokens can never be compared for equality.
//! Equality checks go through [`FieldCipher::fingerprint`] instead.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use super::keystore::{MasterKey, KEY_LEN};
use crate::error::{Error, Result};

/// Current token format version.
const TOKEN_VERSION: u8 = 1;

/// Nonce length for XChaCha20-Poly1305.
const NONCE_LEN: usize = 24;

const ENCRYPTION_CONTEXT: &str = "custreg 2024-06-01 email field encryption";
const FINGERPRINT_CONTEXT: &str = "custreg 2024-06-01 email fingerprint";

/// Encrypts, decrypts, and fingerprints sensitive fields under one master key.
pub struct FieldCipher {
    cipher: XChaCha20Poly1305,
    fingerprint_key: Zeroizing<[u8; KEY_LEN]>,
    key_id: String,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Derive the encryption and fingerprint subkeys from a master key.
    #[must_use]
    pub fn new(master: &MasterKey) -> Self {
        let encryption_key = Zeroizing::new(blake3::derive_key(
            ENCRYPTION_CONTEXT,
            master.as_bytes(),
        ));
        let fingerprint_key = Zeroizing::new(blake3::derive_key(
            FINGERPRINT_CONTEXT,
            master.as_bytes(),
        ));
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(encryption_key.as_slice())),
            fingerprint_key,
            key_id: master.key_id(),
        }
    }

    /// Id of the master key this cipher was built from.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encrypt a text field into a storable token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: self.key_id.as_bytes(),
                },
            )
            .map_err(|_| Error::Crypto("encryption failed"))?;

        let mut token = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(token))
    }

    /// Decrypt a token produced by [`FieldCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the token is malformed, was produced under
    /// another key, has been tampered with, or does not hold UTF-8 text.
    pub fn decrypt(&self, token: &str) -> Result<Zeroizing<String>> {
        let raw = URL_SAFE
            .decode(token.trim())
            .map_err(|_| Error::Crypto("malformed token"))?;
        let Some((&version, rest)) = raw.split_first() else {
            return Err(Error::Crypto("empty token"));
        };
        if version != TOKEN_VERSION {
            return Err(Error::Crypto("unsupported token version"));
        }
        if rest.len() < NONCE_LEN {
            return Err(Error::Crypto("truncated token"));
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.key_id.as_bytes(),
                },
            )
            .map_err(|_| Error::Crypto("decryption failed"))?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| Error::Crypto("decrypted field is not UTF-8"))
    }

    /// Deterministic keyed hash of a value, as lowercase hex.
    ///
    /// The same value under the same key always yields the same fingerprint,
    /// which makes it usable for uniqueness and indexed lookup.
    #[must_use]
    pub fn fingerprint(&self, value: &str) -> String {
        blake3::keyed_hash(&self.fingerprint_key, value.as_bytes())
            .to_hex()
            .to_string()
    }
}
