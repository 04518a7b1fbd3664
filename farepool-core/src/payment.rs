use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Gateway-side status of a freshly created authorization. Only
/// `RequiresCapture` counts as success; anything else is a caller-visible
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    RequiresCapture,
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayAuthorization {
    /// Provider's intent id (e.g. pi_123); stored as the payment's
    /// gateway_reference
    pub id: String,
    pub status: AuthorizationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayChargeStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub status: GatewayChargeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
}

/// Everything the gateway needs to place a hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method_ref: String,
    pub payer_ref: Uuid,
    /// Driver's connected payout account, when funds are routed directly
    pub payout_account_ref: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway declined: {0}")]
    Declined(String),

    /// The request may or may not have been applied at the gateway. Local
    /// state must wait for webhook reconciliation, never assume failure.
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// True when the outcome at the gateway is genuinely unknown.
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}

/// Contract consumed from the external payment gateway. Implementations make
/// synchronous network calls with a bounded timeout; the orchestrator keeps
/// them outside any seat-accounting lock.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Place a hold on the payer's method without charging.
    async fn authorize(&self, req: AuthorizeRequest) -> Result<GatewayAuthorization, GatewayError>;

    /// Convert a hold into a real charge. Called at most once per intent in
    /// the normal flow; the state-machine guard upstream enforces that.
    async fn capture(&self, intent_id: &str) -> Result<GatewayCharge, GatewayError>;

    /// Release a hold without charging.
    async fn cancel_authorization(&self, intent_id: &str) -> Result<(), GatewayError>;

    /// Refund part or all of a captured charge.
    async fn refund(&self, intent_id: &str, amount_cents: i64)
        -> Result<RefundReceipt, GatewayError>;
}

/// Gateway client configuration, injected at construction. No process-wide
/// mutable state. `api_key`, `webhook_secret` and `request_timeout_secs`
/// belong to the production `PaymentGateway` implementation and the HTTP
/// layer's webhook signature check, which live outside this workspace; the
/// orchestrator itself only reads `currency`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub api_key: String,
    pub webhook_secret: String,
    pub currency: String,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            webhook_secret: String::new(),
            currency: "EUR".to_string(),
            request_timeout_secs: 10,
        }
    }
}
