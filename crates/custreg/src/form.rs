//! Form controller: the record-entry screen without the widgets.
//!
//! A [`FormController`] holds the fields a user is editing and runs the
//! actions against a [`Registry`]. Expected failures (bad input, duplicate
//! email, missing record, bad image) become an error [`Notice`]; anything
//! else propagates.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::image;
use crate::registry::Registry;

/// Fields of the record-entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Form {
    /// Id of the record loaded by the last successful search.
    pub id: Option<i64>,
    /// Customer name.
    pub name: String,
    /// Customer email, as typed.
    pub email: String,
    /// Customer phone.
    pub phone: String,
    /// Selected photo.
    pub image_path: Option<PathBuf>,
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// The action succeeded.
    Info,
    /// The action was refused or failed.
    Error,
}

/// Message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity.
    pub kind: NoticeKind,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
}

impl Notice {
    /// An informational notice.
    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    /// An error notice.
    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Check whether this notice reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Turn an expected failure into a notice, or hand the error back.
fn notice_for(err: Error) -> Result<Notice> {
    let title = match err {
        Error::Validation(_) => "Invalid input",
        Error::DuplicateEmail | Error::NoCustomerLoaded => "Error",
        Error::NotFound => "Not found",
        _ if err.is_image_error() => "Image error",
        _ => return Err(err),
    };
    Ok(Notice::error(title, capitalize(&err.to_string())))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drives the form against a registry.
#[derive(Debug)]
pub struct FormController {
    registry: Registry,
    form: Form,
}

impl FormController {
    /// Create a controller with an empty form.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            form: Form::default(),
        }
    }

    /// Current form state.
    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// The registry behind the form.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Set the name field.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    /// Set the email field.
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.form.email = email.into();
    }

    /// Set the phone field.
    pub fn set_phone(&mut self, phone: impl Into<String>) {
        self.form.phone = phone.into();
    }

    /// Insert the form as a new customer. Clears the form on success.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than invalid input, duplicate
    /// email or a bad image.
    pub fn add_customer(&mut self) -> Result<Notice> {
        let result = self.registry.add_from_form(
            &self.form.name,
            &self.form.email,
            &self.form.phone,
            self.form.image_path.as_deref(),
        );
        match result {
            Ok(id) => {
                debug!(customer_id = id, "Form submitted");
                self.clear();
                Ok(Notice::info(
                    "Success",
                    "Customer added (encrypted) successfully",
                ))
            }
            Err(e) => notice_for(e),
        }
    }

    /// Look up the form's email and load the match into the form.
    ///
    /// The email field keeps what was typed.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than an empty email or no match.
    pub fn search(&mut self) -> Result<Notice> {
        let report = match self.registry.search(&self.form.email) {
            Ok(report) => report,
            Err(e) => return notice_for(e),
        };
        let undecryptable = report.undecryptable;

        match report.customer {
            Some(customer) => {
                self.form.id = Some(customer.id);
                self.form.name = customer.name;
                self.form.phone = customer.phone;
                Ok(Notice::info(
                    "Found",
                    format!("Customer {} loaded", customer.id),
                ))
            }
            None if undecryptable > 0 => Ok(Notice::error(
                "Not found",
                format!("Customer not found ({undecryptable} records could not be decrypted)"),
            )),
            None => notice_for(Error::NotFound),
        }
    }

    /// Generate and store XML for the loaded record from the form's id and name.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than no record loaded or the
    /// record having disappeared.
    pub fn generate_xml(&mut self) -> Result<Notice> {
        let Some(id) = self.form.id else {
            return notice_for(Error::NoCustomerLoaded);
        };
        match self.registry.generate_xml(id, &self.form.name) {
            Ok(_) => Ok(Notice::info("Success", "XML generated and stored")),
            Err(e) => notice_for(e),
        }
    }

    /// Check an image file and remember it for the next insert.
    ///
    /// A rejected file leaves the previous selection in place.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures unrelated to the file itself.
    pub fn select_image(&mut self, path: &Path) -> Result<Notice> {
        match image::probe(path, self.registry.image_config()) {
            Ok(info) => {
                self.form.image_path = Some(path.to_path_buf());
                Ok(Notice::info(
                    "Image selected",
                    format!("{} ({} {} bytes)", path.display(), info.format, info.size),
                ))
            }
            Err(e) => notice_for(e),
        }
    }

    /// Reset every field, including the image selection.
    pub fn clear(&mut self) {
        self.form = Form::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::EncryptedCustomer;
    use crate::crypto::{FieldCipher, MasterKey, KEY_LEN};
    use crate::logging::init_test_logging;
    use crate::registry::SearchStrategy;

    fn controller() -> FormController {
        init_test_logging();
        FormController::new(Registry::in_memory(SearchStrategy::Index).unwrap())
    }

    fn fill(form: &mut FormController, name: &str, email: &str, phone: &str) {
        form.set_name(name);
        form.set_email(email);
        form.set_phone(phone);
    }

    #[test]
    fn test_add_clears_form() {
        let mut form = controller();
        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");

        let notice = form.add_customer().unwrap();
        assert_eq!(notice.kind, NoticeKind::Info);
        assert_eq!(notice.message, "Customer added (encrypted) successfully");
        assert_eq!(form.form(), &Form::default());
        assert_eq!(form.registry().count().unwrap(), 1);
    }

    #[test]
    fn test_add_validation_notices() {
        let cases = [
            ("", "jane@example.com", "5551234567", "Name cannot be empty"),
            ("Jane", "jane.example.com", "5551234567", "Invalid email format"),
            ("Jane", "jane@example.com", "12345", "Phone number must be 10 digits"),
        ];
        for (name, email, phone, message) in cases {
            let mut form = controller();
            fill(&mut form, name, email, phone);

            let notice = form.add_customer().unwrap();
            assert!(notice.is_error());
            assert_eq!(notice.message, message);
            // A refused form keeps its contents.
            assert_eq!(form.form().email, email);
        }
    }

    #[test]
    fn test_add_duplicate_notice() {
        let mut form = controller();
        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");
        form.add_customer().unwrap();

        fill(&mut form, "Other", "jane@example.com", "0000000000");
        let notice = form.add_customer().unwrap();
        assert!(notice.is_error());
        assert_eq!(notice.message, "This email already exists");
    }

    #[test]
    fn test_search_fills_form() {
        let mut form = controller();
        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");
        form.add_customer().unwrap();

        form.set_email(" jane@example.com ");
        let notice = form.search().unwrap();
        assert!(!notice.is_error());
        assert_eq!(form.form().id, Some(1));
        assert_eq!(form.form().name, "Jane Doe");
        assert_eq!(form.form().phone, "5551234567");
        assert_eq!(form.form().email, " jane@example.com ");
    }

    #[test]
    fn test_search_not_found_and_empty() {
        let mut form = controller();
        form.set_email("nobody@example.com");
        let notice = form.search().unwrap();
        assert_eq!(notice.message, "Customer not found");
        assert_eq!(form.form().id, None);

        form.set_email("");
        assert_eq!(form.search().unwrap().message, "Enter email to search");
    }

    #[test]
    fn test_search_mentions_undecryptable_rows() {
        init_test_logging();
        let registry = Registry::in_memory(SearchStrategy::Scan).unwrap();
        let foreign = FieldCipher::new(&MasterKey::from_bytes([7u8; KEY_LEN]));
        registry
            .storage()
            .insert(&EncryptedCustomer {
                name: "Foreign".to_string(),
                email_token: foreign.encrypt("x@example.com").unwrap(),
                email_fingerprint: foreign.fingerprint("x@example.com"),
                key_id: foreign.key_id().to_string(),
                phone: "1111111111".to_string(),
                image: None,
            })
            .unwrap();

        let mut form = FormController::new(registry);
        form.set_email("x@example.com");
        let notice = form.search().unwrap();
        assert!(notice.is_error());
        assert!(notice.message.contains("1 records could not be decrypted"));
    }

    #[test]
    fn test_generate_xml_requires_search() {
        let mut form = controller();
        let notice = form.generate_xml().unwrap();
        assert!(notice.is_error());
        assert_eq!(notice.message, "Fetch a customer first");
    }

    #[test]
    fn test_generate_xml_uses_form_name() {
        let mut form = controller();
        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");
        form.add_customer().unwrap();
        form.set_email("jane@example.com");
        form.search().unwrap();

        form.set_name("Jane & Co");
        let notice = form.generate_xml().unwrap();
        assert_eq!(notice.message, "XML generated and stored");

        let stored = form.registry().get(1).unwrap();
        assert_eq!(
            stored.derived_xml.as_deref(),
            Some("<Customer><ID>1</ID><Name>Jane &amp; Co</Name></Customer>")
        );
        // The stored name is unchanged.
        assert_eq!(stored.name, "Jane Doe");
    }

    #[test]
    fn test_select_image() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("photo.png");
        std::fs::write(&good, crate::image::tests::png_bytes()).unwrap();
        let bad = dir.path().join("photo.gif");
        std::fs::write(&bad, b"GIF89a").unwrap();

        let mut form = controller();
        let notice = form.select_image(&good).unwrap();
        assert!(!notice.is_error());
        assert_eq!(form.form().image_path.as_deref(), Some(good.as_path()));

        let notice = form.select_image(&bad).unwrap();
        assert!(notice.is_error());
        assert_eq!(notice.title, "Image error");
        assert_eq!(form.form().image_path.as_deref(), Some(good.as_path()));

        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");
        form.add_customer().unwrap();
        assert!(form.registry().get(1).unwrap().has_image());
    }

    #[test]
    fn test_clear() {
        let mut form = controller();
        fill(&mut form, "Jane Doe", "jane@example.com", "5551234567");
        form.clear();
        assert_eq!(form.form(), &Form::default());
    }

    #[test]
    fn test_notice_constructors() {
        let info = Notice::info("Found", "Customer 1 loaded");
        assert_eq!(info.kind, NoticeKind::Info);
        assert!(!info.is_error());

        let error = Notice::error("Not found", "Customer not found");
        assert_eq!(error.kind, NoticeKind::Error);
        assert!(error.is_error());
        assert_eq!(error.title, "Not found");
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::info("Success", "XML generated and stored");
        assert_eq!(notice.to_string(), "Success: XML generated and stored");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("customer not found"), "Customer not found");
        assert_eq!(capitalize(""), "");
    }
}
