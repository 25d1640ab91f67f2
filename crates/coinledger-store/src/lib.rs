//! Coinledger Credential Storage
//!
//! This crate provides the session model and the durable, process-wide
//! credential store that keeps the current session across restarts.

pub mod credentials;
pub mod error;
pub mod medium;
pub mod models;

pub use credentials::CredentialStore;
pub use error::StoreError;
pub use medium::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use models::{RequiredRole, Role, Session};
