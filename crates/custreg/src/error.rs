//! Error types for custreg.
//!
//! This module defines all error types used throughout the custreg crate.
//! The form controller turns the user-facing kinds (validation, duplicate,
//! not found) into notices; everything else propagates to the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// The main error type for custreg operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    /// A form field failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The email is already registered.
    #[error("this email already exists")]
    DuplicateEmail,

    /// No customer matched the lookup.
    #[error("customer not found")]
    NotFound,

    /// An operation needs a customer loaded by a prior search.
    #[error("fetch a customer first")]
    NoCustomerLoaded,

    // === Image Errors ===
    /// The image file could not be read.
    #[error("failed to read image {path}: {source}")]
    ImageRead {
        /// Path to the image file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The image file is not an accepted type.
    #[error("unsupported image {path}: {reason}")]
    UnsupportedImage {
        /// Path to the image file.
        path: PathBuf,
        /// Why the file was rejected.
        reason: String,
    },

    /// The image file exceeds the configured size limit.
    #[error("image {path} is {size} bytes, limit is {limit}")]
    ImageTooLarge {
        /// Path to the image file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },

    // === Key Errors ===
    /// The key file is unreadable or malformed.
    #[error("invalid key file {path}: {message}")]
    KeyFile {
        /// Path to the key file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The loaded key is not the key the database was created with.
    #[error("key {loaded} does not match database key {expected}")]
    KeyMismatch {
        /// Key id recorded in the database.
        expected: String,
        /// Key id of the loaded key.
        loaded: String,
    },

    /// Encrypting or decrypting a field failed.
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for custreg operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a key file error.
    #[must_use]
    pub fn key_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::KeyFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported image error.
    #[must_use]
    pub fn unsupported_image(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedImage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a uniqueness conflict on the email.
    #[must_use]
    pub fn is_duplicate_email(&self) -> bool {
        matches!(self, Self::DuplicateEmail)
    }

    /// Check if this error means no matching customer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if this error is an input validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error came from image selection or loading.
    #[must_use]
    pub fn is_image_error(&self) -> bool {
        matches!(
            self,
            Self::ImageRead { .. } | Self::UnsupportedImage { .. } | Self::ImageTooLarge { .. }
        )
    }
}
