//! Key management and field-level encryption.
//!
//! - [`KeyStore`] loads the master key file, or creates it on first run.
//! - [`FieldCipher`] derives purpose-specific subkeys from the master key and
//!   encrypts, decrypts, and fingerprints email values.
//!
//! # Example
//!
//! ```
//! use custreg::crypto::{FieldCipher, MasterKey};
//!
//! let cipher = FieldCipher::new(&MasterKey::generate());
//! let token = cipher.encrypt("jane@example.com").unwrap();
//! assert_eq!(cipher.decrypt(&token).unwrap().as_str(), "jane@example.com");
//! assert_eq!(
//!     cipher.fingerprint("jane@example.com"),
//!     cipher.fingerprint("jane@example.com"),
//! );
//! ```

mod cipher;
mod keystore;

pub use cipher::FieldCipher;
pub use keystore::{KeyStore, MasterKey, KEY_LEN};
