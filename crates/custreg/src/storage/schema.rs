//! `SQLite` schema definitions for custreg.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the customers table.
///
/// `email` holds ciphertext. Its `UNIQUE` constraint never fires in practice
/// because every encryption uses a fresh nonce; `email_fingerprint` is what
/// rejects a repeated email.
pub const CREATE_CUSTOMERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    email_fingerprint TEXT NOT NULL UNIQUE,
    key_id TEXT NOT NULL,
    phone TEXT NOT NULL,
    image BLOB,
    derived_xml TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_CUSTOMERS_TABLE, CREATE_METADATA_TABLE];
