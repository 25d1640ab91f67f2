//! Ledger resource API
//!
//! Thin calls over [`AuthTransport`] for the endpoints the dashboard uses.
//! Response bodies are passed through as JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::error::ClientError;
use crate::transport::AuthTransport;

/// Kind of recorded ledger transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Mint,
    Burn,
}

/// Transaction record sent to the backend after an on-chain operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_hash: String,
    pub to_address: String,
    pub amount: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Check that `amount` is a positive decimal number
pub fn validate_amount(amount: &str) -> Result<(), ClientError> {
    let amount = amount.trim();
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if amount.is_empty()
        || (whole.is_empty() && fraction.is_empty())
        || !digits_only(whole)
        || !digits_only(fraction)
    {
        return Err(ClientError::InvalidInput(format!(
            "invalid amount: {:?}",
            amount
        )));
    }

    if !amount.chars().any(|c| matches!(c, '1'..='9')) {
        return Err(ClientError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Ledger API client
#[derive(Clone)]
pub struct LedgerApi {
    transport: Arc<AuthTransport>,
}

impl LedgerApi {
    pub fn new(transport: Arc<AuthTransport>) -> Self {
        Self { transport }
    }

    /// Fiat and token balances of the current user
    pub async fn balance(&self) -> Result<Value, ClientError> {
        self.transport.get_json("/balance").await
    }

    /// Transaction history, fetched whole
    pub async fn transactions(&self) -> Result<Value, ClientError> {
        self.transport.get_json("/transactions").await
    }

    /// Token owners (admin view)
    pub async fn owners(&self) -> Result<Value, ClientError> {
        self.transport.get_json("/owners").await
    }

    /// Aggregate statistics (admin view)
    pub async fn stats(&self) -> Result<Value, ClientError> {
        self.transport.get_json("/admin/stats").await
    }

    /// Register a wallet address for the current user
    pub async fn register_wallet(&self, address: &str) -> Result<Value, ClientError> {
        let reply = self
            .transport
            .post_json("/wallet", &json!({ "address": address }))
            .await?;
        info!("Registered wallet {}", address);
        Ok(reply)
    }

    /// Record a transaction made elsewhere
    pub async fn record_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<Value, ClientError> {
        validate_amount(&record.amount)?;
        self.transport.post_json("/transactions", record).await
    }

    /// Mint new supply
    pub async fn mint(&self, amount: &str, to_address: Option<&str>) -> Result<Value, ClientError> {
        validate_amount(amount)?;
        let mut body = json!({ "amount": amount.trim() });
        if let Some(to) = to_address {
            body["toAddress"] = json!(to);
        }
        let reply = self.transport.post_json("/admin/mint", &body).await?;
        info!("Minted {} tokens", amount.trim());
        Ok(reply)
    }

    /// Burn supply
    pub async fn burn(&self, amount: &str) -> Result<Value, ClientError> {
        validate_amount(amount)?;
        let reply = self
            .transport
            .post_json("/admin/burn", &json!({ "amount": amount.trim() }))
            .await?;
        info!("Burned {} tokens", amount.trim());
        Ok(reply)
    }
}
