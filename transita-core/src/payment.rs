use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider verdict for a transaction, as classified by the gateway client:
/// anything that is neither success nor still-processing is treated as
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayVerdict {
    Success,
    Pending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction_id: String,
    /// Where the requester completes the payment.
    pub redirect_url: String,
}

/// A provider push notification, already classified by the receiving
/// adapter. The raw payload is persisted on the booking for reconciliation.
#[derive(Debug, Clone)]
pub struct ProviderNotification {
    pub verdict: GatewayVerdict,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("payment provider unreachable: {0}")]
    Transport(String),

    #[error("payment provider request timed out")]
    Timeout,
}

/// Thin translation layer to the external payment provider. Stateless; the
/// caller owns all compensating actions when a call fails.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment session for the transaction and return the redirect
    /// target the requester must visit.
    async fn initiate(
        &self,
        requester_id: &str,
        transaction_id: &str,
        amount: i64,
    ) -> Result<InitiatedPayment, GatewayError>;

    /// Poll the provider for the transaction's current verdict.
    async fn check_status(&self, transaction_id: &str) -> Result<GatewayVerdict, GatewayError>;
}
