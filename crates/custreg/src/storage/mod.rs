//! Storage layer for custreg.
//!
//! This module provides `SQLite`-based persistent storage for customer
//! records. It only ever sees encrypted emails; encryption and decryption
//! happen in the registry above it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::customer::{EncryptedCustomer, EncryptedRow, StoredCustomer};
use crate::error::{Error, Result};

/// Metadata key holding the id of the key the database was created with.
const KEY_ID_KEY: &str = "key_id";

/// Storage engine for customer records.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Record insertion with fingerprint-based uniqueness
/// - Indexed lookup by email fingerprint
/// - Full-table scans for the decrypt-and-compare search
/// - Attaching derived XML to an existing record
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the key this database was created with, if recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn key_id(&self) -> Result<Option<String>> {
        migrations::get_metadata(&self.conn, KEY_ID_KEY)
    }

    /// Tie this database to a key.
    ///
    /// The first call records the key id. Later calls must present the same
    /// id, so rows encrypted under one key are never read with another.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyMismatch`] if a different key id is recorded.
    pub fn bind_key_id(&self, key_id: &str) -> Result<()> {
        match self.key_id()? {
            Some(expected) if expected == key_id => Ok(()),
            Some(expected) => Err(Error::KeyMismatch {
                expected,
                loaded: key_id.to_string(),
            }),
            None => {
                migrations::set_metadata(&self.conn, KEY_ID_KEY, key_id)?;
                info!(key_id, "Bound database to key");
                Ok(())
            }
        }
    }

    /// Insert a customer record.
    ///
    /// Returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEmail`] if the email fingerprint is already
    /// present, or another error if the database operation fails.
    pub fn insert(&self, customer: &EncryptedCustomer) -> Result<i64> {
        let created_at = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            r"
            INSERT INTO customers (name, email, email_fingerprint, key_id, phone, image, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                customer.name,
                customer.email_token,
                customer.email_fingerprint,
                customer.key_id,
                customer.phone,
                customer.image,
                created_at,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                debug!("Inserted customer with id {}", id);
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                debug!("Rejected customer with duplicate email fingerprint");
                Err(Error::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the row holding the given email fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<EncryptedRow>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT id, name, email, phone
                FROM customers WHERE email_fingerprint = ?1
                ",
                [fingerprint],
                Self::row_to_encrypted,
            )
            .optional()?;
        Ok(row)
    }

    /// Load the search columns of every row, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn scan(&self) -> Result<Vec<EncryptedRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email, phone FROM customers ORDER BY id ASC")?;

        let rows = stmt
            .query_map([], Self::row_to_encrypted)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Get a full record by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<StoredCustomer>> {
        let result = self
            .conn
            .query_row(
                r"
                SELECT id, name, email, key_id, phone, image, derived_xml, created_at
                FROM customers WHERE id = ?1
                ",
                [id],
                Self::row_to_stored,
            )
            .optional()?;
        Ok(result)
    }

    /// Set or replace the derived XML of a record.
    ///
    /// Returns `true` if the record exists, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_derived_xml(&self, id: i64, xml: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE customers SET derived_xml = ?1 WHERE id = ?2",
            params![xml, id],
        )?;
        if affected > 0 {
            debug!("Stored derived XML for customer {}", id);
        }
        Ok(affected > 0)
    }

    /// Count total customers in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_customers, with_image, with_xml): (i64, i64, i64) = self.conn.query_row(
            r"
            SELECT COUNT(*),
                   COUNT(image),
                   COUNT(derived_xml)
            FROM customers
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            // Recent writes live in the WAL until the next checkpoint.
            file_len(&self.path) + file_len(&self.wal_path())
        };

        Ok(StorageStats {
            total_customers,
            with_image,
            with_xml,
            key_id: self.key_id()?,
            db_size_bytes,
        })
    }

    fn wal_path(&self) -> PathBuf {
        let mut wal = self.path.clone().into_os_string();
        wal.push("-wal");
        PathBuf::from(wal)
    }

    fn row_to_encrypted(row: &rusqlite::Row) -> rusqlite::Result<EncryptedRow> {
        Ok(EncryptedRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email_token: row.get(2)?,
            phone: row.get(3)?,
        })
    }

    fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredCustomer> {
        let id: i64 = row.get(0)?;
        let created_at_str: String = row.get(7)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str).map_or_else(
            |_| {
                warn!(
                    "Unparseable created_at {} on customer {}, using epoch",
                    created_at_str, id
                );
                DateTime::<Utc>::UNIX_EPOCH
            },
            |dt| dt.with_timezone(&Utc),
        );

        Ok(StoredCustomer {
            id,
            name: row.get(1)?,
            email_token: row.get(2)?,
            key_id: row.get(3)?,
            phone: row.get(4)?,
            image: row.get(5)?,
            derived_xml: row.get(6)?,
            created_at,
        })
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of customers stored.
    pub total_customers: i64,
    /// Customers with an attached image.
    pub with_image: i64,
    /// Customers with stored derived XML.
    pub with_xml: i64,
    /// Id of the key the database is bound to.
    pub key_id: Option<String>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
