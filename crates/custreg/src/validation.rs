//! Form field validation.
//!
//! Checks run in a fixed order and the first failure wins: name, then email,
//! then phone. Nothing here touches storage.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Basic `local@domain.tld` shape.
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$";

/// Required number of phone digits.
pub const PHONE_DIGITS: usize = 10;

/// A form field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The name field is blank.
    #[error("name cannot be empty")]
    EmptyName,

    /// The email does not look like `local@domain.tld`.
    #[error("invalid email format")]
    InvalidEmail,

    /// The phone is not exactly ten digits.
    #[error("phone number must be 10 digits")]
    InvalidPhone,

    /// A search was requested with no email.
    #[error("enter email to search")]
    EmptySearch,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Check that a name is present.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] if the name is blank.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Check that an email has the `local@domain.tld` shape.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidEmail`] if the email does not match.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !email_regex().is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Check that a phone is exactly ten ASCII digits.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPhone`] otherwise.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() != PHONE_DIGITS || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(())
}

/// Validate all customer fields in order.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate_inputs(name: &str, email: &str, phone: &str) -> Result<(), ValidationError> {
    validate_name(name)?;
    validate_email(email)?;
    validate_phone(phone)?;
    Ok(())
}
