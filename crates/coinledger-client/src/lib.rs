//! Coinledger API Client
//!
//! This crate provides the authenticated transport every ledger API call
//! goes through, and thin typed calls for the ledger's resource endpoints.

pub mod error;
pub mod ledger;
pub mod transport;

pub use error::ClientError;
pub use ledger::{LedgerApi, TransactionKind, TransactionRecord, validate_amount};
pub use transport::{ApiRequest, AuthTransport, TransportConfig};
