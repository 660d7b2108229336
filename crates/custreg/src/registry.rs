//! The encrypted customer registry.
//!
//! [`Registry`] ties the key store's cipher to the record store. Every email
//! crosses this boundary: it is encrypted and fingerprinted on the way in and
//! decrypted on the way out. Storage never sees a plaintext email.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, ImageConfig};
use crate::crypto::{FieldCipher, KeyStore, MasterKey};
use crate::customer::{Customer, CustomerSummary, EncryptedCustomer, EncryptedRow, NewCustomer};
use crate::error::{Error, Result};
use crate::image;
use crate::storage::{Storage, StorageStats};
use crate::validation::ValidationError;
use crate::xml;

/// How search-by-email locates a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Look up the email fingerprint through its unique index.
    #[default]
    Index,
    /// Decrypt every row in id order until one matches.
    Scan,
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Scan => write!(f, "scan"),
        }
    }
}

/// Outcome of a search-by-email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// The matching customer, if any.
    pub customer: Option<CustomerSummary>,
    /// Strategy that produced this result.
    pub strategy: SearchStrategy,
    /// Rows whose email was decrypted and compared.
    pub rows_examined: usize,
    /// Rows skipped because their email could not be decrypted.
    pub undecryptable: usize,
}

impl SearchReport {
    fn new(strategy: SearchStrategy) -> Self {
        Self {
            customer: None,
            strategy,
            rows_examined: 0,
            undecryptable: 0,
        }
    }

    /// Check whether a customer was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.customer.is_some()
    }

    /// Convert to the found customer, or [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no customer matched.
    pub fn into_customer(self) -> Result<CustomerSummary> {
        self.customer.ok_or(Error::NotFound)
    }
}

/// Customer registry with an encrypted email column.
#[derive(Debug)]
pub struct Registry {
    storage: Storage,
    cipher: FieldCipher,
    strategy: SearchStrategy,
    image_config: ImageConfig,
}

impl Registry {
    /// Open the registry described by a configuration.
    ///
    /// Opens the database (creating it if absent), then loads the key file
    /// and checks that both belong together. A new key is only created for
    /// a database that is not yet bound to one.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or database cannot be opened, if the key
    /// file is missing for a database that already has a key, or if the
    /// database was created under a different key.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let key_store = KeyStore::new(config.key_path());
        let key = if storage.key_id()?.is_some() {
            if !key_store.exists() {
                return Err(Error::key_file(
                    key_store.path(),
                    "missing key for existing database",
                ));
            }
            key_store.load()?
        } else {
            key_store.load_or_create()?
        };
        Self::new(
            storage,
            &key,
            config.search.strategy,
            config.image.clone(),
        )
    }

    /// Assemble a registry from an opened store and a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyMismatch`] if the store is bound to another key.
    pub fn new(
        storage: Storage,
        key: &MasterKey,
        strategy: SearchStrategy,
        image_config: ImageConfig,
    ) -> Result<Self> {
        let cipher = FieldCipher::new(key);
        storage.bind_key_id(cipher.key_id())?;
        Ok(Self {
            storage,
            cipher,
            strategy,
            image_config,
        })
    }

    /// Registry over a fresh in-memory database and a random key.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(strategy: SearchStrategy) -> Result<Self> {
        Self::new(
            Storage::open_in_memory()?,
            &MasterKey::generate(),
            strategy,
            ImageConfig::default(),
        )
    }

    /// The active search strategy.
    #[must_use]
    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Switch the search strategy.
    pub fn set_strategy(&mut self, strategy: SearchStrategy) {
        self.strategy = strategy;
    }

    /// Image acceptance rules.
    #[must_use]
    pub fn image_config(&self) -> &ImageConfig {
        &self.image_config
    }

    /// The underlying record store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Id of the key in use.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.cipher.key_id()
    }

    /// Validate raw form input, read the image if one was chosen, and insert.
    ///
    /// Validation runs before anything else, so a rejected form never
    /// touches the image file or the database.
    ///
    /// # Errors
    ///
    /// Returns a validation error, an image error, [`Error::DuplicateEmail`],
    /// or a storage error.
    pub fn add_from_form(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        image_path: Option<&Path>,
    ) -> Result<i64> {
        let mut customer = NewCustomer::new(name, email, phone, None)?;
        if let Some(path) = image_path {
            customer.image = Some(image::read_image(path, &self.image_config)?);
        }
        self.add_customer(&customer)
    }

    /// Encrypt and insert a validated customer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEmail`] if the email is already registered,
    /// or a crypto or storage error.
    pub fn add_customer(&self, customer: &NewCustomer) -> Result<i64> {
        let encrypted = EncryptedCustomer {
            name: customer.name.clone(),
            email_token: self.cipher.encrypt(&customer.email)?,
            email_fingerprint: self.cipher.fingerprint(&customer.email),
            key_id: self.cipher.key_id().to_string(),
            phone: customer.phone.clone(),
            image: customer.image.clone(),
        };
        let id = self.storage.insert(&encrypted)?;
        info!(
            customer_id = id,
            has_image = customer.image.is_some(),
            "Added customer"
        );
        Ok(id)
    }

    /// Search for a customer by plaintext email using the active strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySearch`] for a blank email, or a
    /// storage error. In index mode, a row whose fingerprint matches but
    /// whose email cannot be decrypted is a crypto error.
    pub fn search(&self, email: &str) -> Result<SearchReport> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptySearch.into());
        }

        let report = match self.strategy {
            SearchStrategy::Index => self.search_indexed(email)?,
            SearchStrategy::Scan => self.search_scan(email)?,
        };

        debug!(
            strategy = %report.strategy,
            found = report.is_found(),
            rows_examined = report.rows_examined,
            undecryptable = report.undecryptable,
            "Search finished"
        );
        Ok(report)
    }

    /// Search and return the found customer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing matches, plus the errors of
    /// [`Registry::search`].
    pub fn find_by_email(&self, email: &str) -> Result<CustomerSummary> {
        self.search(email)?.into_customer()
    }

    fn search_indexed(&self, email: &str) -> Result<SearchReport> {
        let mut report = SearchReport::new(SearchStrategy::Index);
        let Some(row) = self.storage.find_by_fingerprint(&self.cipher.fingerprint(email))? else {
            return Ok(report);
        };

        let decrypted = self.cipher.decrypt(&row.email_token)?;
        report.rows_examined = 1;
        if decrypted.as_str() == email {
            report.customer = Some(summary(row, email));
        } else {
            warn!(customer_id = row.id, "Fingerprint matched but email differs");
        }
        Ok(report)
    }

    fn search_scan(&self, email: &str) -> Result<SearchReport> {
        let mut report = SearchReport::new(SearchStrategy::Scan);

        for row in self.storage.scan()? {
            match self.cipher.decrypt(&row.email_token) {
                Ok(decrypted) => {
                    report.rows_examined += 1;
                    if decrypted.as_str() == email {
                        report.customer = Some(summary(row, email));
                        break;
                    }
                }
                Err(e) => {
                    report.undecryptable += 1;
                    warn!(customer_id = row.id, error = %e, "Skipping undecryptable row");
                }
            }
        }

        Ok(report)
    }

    /// Build and store the derived XML for a record.
    ///
    /// `name` is embedded as given, after escaping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, or a storage error.
    pub fn generate_xml(&self, id: i64, name: &str) -> Result<String> {
        let xml = xml::customer_xml(id, name);
        if !self.storage.set_derived_xml(id, &xml)? {
            return Err(Error::NotFound);
        }
        info!(customer_id = id, "Stored derived XML");
        Ok(xml)
    }

    /// Load a full record by id, decrypting its email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, or a crypto or
    /// storage error.
    pub fn get(&self, id: i64) -> Result<Customer> {
        let stored = self.storage.get(id)?.ok_or(Error::NotFound)?;
        if stored.key_id != self.cipher.key_id() {
            return Err(Error::KeyMismatch {
                expected: stored.key_id,
                loaded: self.cipher.key_id().to_string(),
            });
        }
        let email = self.cipher.decrypt(&stored.email_token)?;
        Ok(Customer {
            id: stored.id,
            name: stored.name,
            email: email.as_str().to_string(),
            phone: stored.phone,
            image: stored.image,
            derived_xml: stored.derived_xml,
            created_at: stored.created_at,
        })
    }

    /// Number of stored customers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        self.storage.count()
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }
}

fn summary(row: EncryptedRow, email: &str) -> CustomerSummary {
    CustomerSummary {
        id: row.id,
        name: row.name,
        email: email.to_string(),
        phone: row.phone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;
    use crate::logging::init_test_logging;

    const STRATEGIES: [SearchStrategy; 2] = [SearchStrategy::Index, SearchStrategy::Scan];

    fn registry(strategy: SearchStrategy) -> Registry {
        init_test_logging();
        Registry::in_memory(strategy).expect("failed to create registry")
    }

    fn jane() -> NewCustomer {
        NewCustomer::new("Jane Doe", "jane@example.com", "5551234567", None).unwrap()
    }

    #[test]
    fn test_insert_then_search_example() {
        for strategy in STRATEGIES {
            let registry = registry(strategy);
            let id = registry.add_customer(&jane()).unwrap();
            assert_eq!(id, 1);

            let found = registry.find_by_email("jane@example.com").unwrap();
            assert_eq!(found.id, 1);
            assert_eq!(found.name, "Jane Doe");
            assert_eq!(found.phone, "5551234567");
            assert_eq!(found.email, "jane@example.com");

            let stored = registry.storage().get(1).unwrap().unwrap();
            assert_ne!(stored.email_token, "jane@example.com");
            assert!(!stored.email_token.contains("jane"));
        }
    }

    #[test]
    fn test_insert_then_search_many() {
        let inputs = [
            ("Ada Lovelace", "ada@analytical.org", "0000000001"),
            ("Alan Turing", "alan.turing+bletchley@gov.uk", "1234567890"),
            ("Grace Hopper", "grace_h@navy.mil", "9999999999"),
            ("Zoë Ünicode", "zoe@xn--mnchen-3ya.de", "4155550100"),
        ];
        for strategy in STRATEGIES {
            let registry = registry(strategy);
            for (name, email, phone) in inputs {
                registry.add_from_form(name, email, phone, None).unwrap();
            }
            for (name, email, phone) in inputs {
                let found = registry.find_by_email(email).unwrap();
                assert_eq!(found.name, name);
                assert_eq!(found.phone, phone);
            }
        }
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let registry = registry(SearchStrategy::Index);
        registry.add_customer(&jane()).unwrap();

        let err = registry
            .add_from_form("Someone Else", "jane@example.com", "0123456789", None)
            .unwrap_err();
        assert!(err.is_duplicate_email());
        assert_eq!(registry.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_detected_after_trimming() {
        let registry = registry(SearchStrategy::Index);
        registry.add_customer(&jane()).unwrap();

        let err = registry
            .add_from_form("Jane", "  jane@example.com ", "5551234567", None)
            .unwrap_err();
        assert!(err.is_duplicate_email());
    }

    #[test]
    fn test_email_comparison_is_exact() {
        let registry = registry(SearchStrategy::Index);
        registry.add_customer(&jane()).unwrap();

        registry
            .add_from_form("Jane Upper", "Jane@Example.com", "5551234567", None)
            .unwrap();
        assert_eq!(registry.count().unwrap(), 2);
        assert_eq!(
            registry.find_by_email("Jane@Example.com").unwrap().name,
            "Jane Upper"
        );
    }

    #[test]
    fn test_invalid_input_never_writes() {
        let registry = registry(SearchStrategy::Index);
        let cases = [
            ("", "jane@example.com", "5551234567"),
            ("Jane", "not-an-email", "5551234567"),
            ("Jane", "jane@example.com", "555123456"),
            ("Jane", "jane@example.com", "55512345678"),
            ("Jane", "jane@example.com", "555123456x"),
        ];
        for (name, email, phone) in cases {
            let err = registry.add_from_form(name, email, phone, None).unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {err}");
        }
        assert_eq!(registry.count().unwrap(), 0);
    }

    #[test]
    fn test_validation_runs_before_image_read() {
        let registry = registry(SearchStrategy::Index);
        let err = registry
            .add_from_form("", "jane@example.com", "5551234567", Some(Path::new("/nope.png")))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_add_with_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.png");
        std::fs::write(&path, crate::image::tests::png_bytes()).unwrap();

        let registry = registry(SearchStrategy::Index);
        let id = registry
            .add_from_form("Jane Doe", "jane@example.com", "5551234567", Some(&path))
            .unwrap();

        let customer = registry.get(id).unwrap();
        assert_eq!(customer.image.as_deref(), Some(crate::image::tests::png_bytes().as_slice()));
    }

    #[test]
    fn test_bad_image_aborts_insert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jane.png");
        std::fs::write(&path, b"not an image").unwrap();

        let registry = registry(SearchStrategy::Index);
        let err = registry
            .add_from_form("Jane Doe", "jane@example.com", "5551234567", Some(&path))
            .unwrap_err();
        assert!(err.is_image_error());
        assert_eq!(registry.count().unwrap(), 0);
    }

    #[test]
    fn test_search_not_found() {
        for strategy in STRATEGIES {
            let registry = registry(strategy);
            registry.add_customer(&jane()).unwrap();

            let report = registry.search("john@example.com").unwrap();
            assert!(!report.is_found());
            assert!(registry.find_by_email("john@example.com").unwrap_err().is_not_found());
        }
    }

    #[test]
    fn test_search_empty_store() {
        for strategy in STRATEGIES {
            let registry = registry(strategy);
            let report = registry.search("jane@example.com").unwrap();
            assert!(!report.is_found());
            assert_eq!(report.rows_examined, 0);
        }
    }

    #[test]
    fn test_search_blank_email() {
        let registry = registry(SearchStrategy::Scan);
        let err = registry.search("   ").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::EmptySearch)
        ));
    }

    #[test]
    fn test_search_trims_input() {
        let registry = registry(SearchStrategy::Index);
        registry.add_customer(&jane()).unwrap();
        assert!(registry.search(" jane@example.com\n").unwrap().is_found());
    }

    #[test]
    fn test_scan_stops_at_first_match() {
        let registry = registry(SearchStrategy::Scan);
        registry.add_from_form("A", "a@example.com", "0000000000", None).unwrap();
        registry.add_from_form("B", "b@example.com", "0000000000", None).unwrap();
        registry.add_from_form("C", "c@example.com", "0000000000", None).unwrap();

        let report = registry.search("b@example.com").unwrap();
        assert_eq!(report.customer.unwrap().name, "B");
        assert_eq!(report.rows_examined, 2);
        assert_eq!(report.strategy, SearchStrategy::Scan);
    }

    /// Insert a row whose email was encrypted under some other key.
    fn insert_foreign_row(registry: &Registry, email: &str) {
        let foreign = FieldCipher::new(&MasterKey::from_bytes([42u8; KEY_LEN]));
        registry
            .storage()
            .insert(&EncryptedCustomer {
                name: "Foreign".to_string(),
                email_token: foreign.encrypt(email).unwrap(),
                email_fingerprint: foreign.fingerprint(email),
                key_id: foreign.key_id().to_string(),
                phone: "1111111111".to_string(),
                image: None,
            })
            .unwrap();
    }

    #[test]
    fn test_scan_skips_undecryptable_rows() {
        let registry = registry(SearchStrategy::Scan);
        insert_foreign_row(&registry, "jane@example.com");
        registry.add_customer(&jane()).unwrap();

        let report = registry.search("jane@example.com").unwrap();
        assert_eq!(report.undecryptable, 1);
        let found = report.customer.unwrap();
        assert_eq!(found.name, "Jane Doe");
        assert_eq!(found.id, 2);
    }

    #[test]
    fn test_scan_undecryptable_only_is_not_found() {
        let registry = registry(SearchStrategy::Scan);
        insert_foreign_row(&registry, "jane@example.com");

        let report = registry.search("jane@example.com").unwrap();
        assert!(!report.is_found());
        assert_eq!(report.undecryptable, 1);
        assert_eq!(report.rows_examined, 0);
    }

    #[test]
    fn test_index_ignores_foreign_fingerprints() {
        let registry = registry(SearchStrategy::Index);
        insert_foreign_row(&registry, "jane@example.com");

        assert!(!registry.search("jane@example.com").unwrap().is_found());
    }

    #[test]
    fn test_generate_xml() {
        let registry = registry(SearchStrategy::Index);
        let id = registry.add_customer(&jane()).unwrap();

        let xml = registry.generate_xml(id, "Jane Doe").unwrap();
        assert_eq!(xml, "<Customer><ID>1</ID><Name>Jane Doe</Name></Customer>");
        assert_eq!(registry.get(id).unwrap().derived_xml.as_deref(), Some(xml.as_str()));
    }

    #[test]
    fn test_generate_xml_escapes_name() {
        let registry = registry(SearchStrategy::Index);
        let id = registry
            .add_from_form("A & <B>", "ab@example.com", "5551234567", None)
            .unwrap();

        let xml = registry.generate_xml(id, "A & <B>").unwrap();
        assert!(xml.contains("<Name>A &amp; &lt;B&gt;</Name>"));
    }

    #[test]
    fn test_generate_xml_missing_record() {
        let registry = registry(SearchStrategy::Index);
        assert!(registry.generate_xml(5, "Ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get() {
        let registry = registry(SearchStrategy::Index);
        let id = registry.add_customer(&jane()).unwrap();

        let customer = registry.get(id).unwrap();
        assert_eq!(customer.email, "jane@example.com");
        assert!(!customer.has_image());
        assert!(registry.get(99).unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_foreign_row_is_key_mismatch() {
        let registry = registry(SearchStrategy::Index);
        insert_foreign_row(&registry, "x@example.com");
        assert!(matches!(
            registry.get(1).unwrap_err(),
            Error::KeyMismatch { .. }
        ));
    }

    #[test]
    fn test_open_rejects_other_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database_path = Some(dir.path().join("customers.db"));
        config.storage.key_path = Some(dir.path().join("secret.key"));

        {
            let registry = Registry::open(&config).unwrap();
            registry.add_customer(&jane()).unwrap();
        }

        // Reopening with the same key works and keeps the data.
        {
            let registry = Registry::open(&config).unwrap();
            assert_eq!(registry.find_by_email("jane@example.com").unwrap().id, 1);
        }

        config.storage.key_path = Some(dir.path().join("other.key"));
        let err = Registry::open(&config).unwrap_err();
        assert!(matches!(err, Error::KeyMismatch { .. }));
    }

    #[test]
    fn test_open_with_missing_key_does_not_create_one() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("secret.key");
        let mut config = Config::default();
        config.storage.database_path = Some(dir.path().join("customers.db"));
        config.storage.key_path = Some(key_path.clone());

        {
            let registry = Registry::open(&config).unwrap();
            registry.add_customer(&jane()).unwrap();
        }
        std::fs::remove_file(&key_path).unwrap();

        let err = Registry::open(&config).unwrap_err();
        assert!(matches!(err, Error::KeyFile { .. }));
        assert!(err.to_string().contains("missing key for existing database"));
        assert!(!key_path.exists());

        // Repeated attempts keep failing the same way.
        assert!(matches!(
            Registry::open(&config).unwrap_err(),
            Error::KeyFile { .. }
        ));
        assert!(!key_path.exists());
    }

    #[test]
    fn test_open_creates_key_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database_path = Some(dir.path().join("data/customers.db"));
        config.storage.key_path = Some(dir.path().join("keys/secret.key"));

        let registry = Registry::open(&config).unwrap();
        assert!(dir.path().join("data/customers.db").exists());
        assert!(dir.path().join("keys/secret.key").exists());
        assert_eq!(
            registry.stats().unwrap().key_id.as_deref(),
            Some(registry.key_id())
        );
    }

    #[test]
    fn test_strategy_switch() {
        let mut registry = registry(SearchStrategy::Index);
        registry.add_customer(&jane()).unwrap();
        registry.set_strategy(SearchStrategy::Scan);
        assert_eq!(registry.strategy(), SearchStrategy::Scan);
        assert_eq!(
            registry.search("jane@example.com").unwrap().strategy,
            SearchStrategy::Scan
        );
    }

    #[test]
    fn test_strategy_display_and_serde() {
        assert_eq!(SearchStrategy::Index.to_string(), "index");
        assert_eq!(SearchStrategy::Scan.to_string(), "scan");
        assert_eq!(serde_json::to_string(&SearchStrategy::Scan).unwrap(), "\"scan\"");
    }
}
