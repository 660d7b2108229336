//! Core customer types for custreg.
//!
//! Plaintext views ([`NewCustomer`], [`Customer`], [`CustomerSummary`]) are what
//! callers see. Encrypted views ([`EncryptedCustomer`], [`EncryptedRow`]) are what
//! the storage layer reads and writes; only the registry converts between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{validate_inputs, ValidationError};

/// Validated input for a new customer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    /// Display name, trimmed.
    pub name: String,
    /// Email, trimmed. Encrypted before storage.
    pub email: String,
    /// Ten-digit phone number.
    pub phone: String,
    /// Raw image bytes, if an image was selected.
    pub image: Option<Vec<u8>>,
}

impl NewCustomer {
    /// Trim and validate raw form input.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`], checking name, email,
    /// then phone.
    pub fn new(
        name: &str,
        email: &str,
        phone: &str,
        image: Option<Vec<u8>>,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        let email = email.trim();
        let phone = phone.trim();
        validate_inputs(name, email, phone)?;
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            image,
        })
    }
}

/// A customer row ready to be written, with the email already encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCustomer {
    /// Display name.
    pub name: String,
    /// Encrypted email token.
    pub email_token: String,
    /// Keyed fingerprint of the plaintext email.
    pub email_fingerprint: String,
    /// Id of the key that produced the token.
    pub key_id: String,
    /// Ten-digit phone number.
    pub phone: String,
    /// Raw image bytes.
    pub image: Option<Vec<u8>>,
}

/// The columns a search needs, with the email still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRow {
    /// Customer id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Encrypted email token.
    pub email_token: String,
    /// Phone number.
    pub phone: String,
}

/// A full stored record, with the email still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCustomer {
    /// Customer id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Encrypted email token.
    pub email_token: String,
    /// Id of the key that produced the token.
    pub key_id: String,
    /// Phone number.
    pub phone: String,
    /// Raw image bytes.
    pub image: Option<Vec<u8>>,
    /// Stored derived XML.
    pub derived_xml: Option<String>,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
}

/// The record shown after a successful search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    /// Customer id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Decrypted email.
    pub email: String,
    /// Phone number.
    pub phone: String,
}

/// A full decrypted customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Decrypted email.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// Raw image bytes; omitted from serialized output.
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
    /// Stored derived XML.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_xml: Option<String>,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Size of the attached image in bytes, if any.
    #[must_use]
    pub fn image_len(&self) -> Option<usize> {
        self.image.as_ref().map(Vec::len)
    }

    /// Check whether an image is attached.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

impl From<Customer> for CustomerSummary {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
        }
    }
}
