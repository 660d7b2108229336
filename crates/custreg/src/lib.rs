//! `custreg` - Customer records with an encrypted email field
//!
//! This library stores customers in `SQLite`, encrypting each email with a
//! key held in a separate key file, and supports searching by email, attaching
//! a photo, and generating a small XML snippet per record.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod crypto;
pub mod customer;
pub mod error;
pub mod form;
pub mod image;
pub mod logging;
pub mod registry;
pub mod storage;
pub mod validation;
pub mod xml;

pub use config::Config;
pub use customer::{Customer, CustomerSummary, NewCustomer};
pub use error::{Error, Result};
pub use form::{Form, FormController, Notice, NoticeKind};
pub use logging::init_logging;
pub use registry::{Registry, SearchReport, SearchStrategy};
pub use storage::{Storage, StorageStats};
pub use validation::ValidationError;
