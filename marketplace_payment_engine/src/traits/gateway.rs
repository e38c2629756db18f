use chrono::{DateTime, Utc};
use mps_common::Kobo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The gateway's authoritative view of a reference, normalized at the client boundary. Raw gateway maps never
/// travel past this type: every metadata field is an explicit, already-validated optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedTransaction {
    pub reference: String,
    /// Amount actually charged.
    pub amount: Kobo,
    pub currency: String,
    /// Fee retained by the gateway itself.
    pub fees: Kobo,
    pub paid_at: Option<DateTime<Utc>>,
    /// The gateway's own status string, kept verbatim for audit payloads.
    pub gateway_status: String,
    pub metadata: VerifiedMetadata,
}

/// Metadata echoed back from transaction initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifiedMetadata {
    pub vendor_id: Option<String>,
    pub food_amount: Option<Kobo>,
    pub delivery_fee: Option<Kobo>,
    pub vat_amount: Option<Kobo>,
    pub service_request_id: Option<i64>,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway processed the lookup and reports the charge as not successful. Terminal; retrying the
    /// pipeline will not change the answer.
    #[error("Gateway declined the transaction (status '{status}')")]
    Declined { status: String, raw: String },
    /// Transport-level failure, including timeouts. The whole pipeline is safe to retry.
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),
    /// The gateway answered with something we could not interpret.
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Read-only verification call against the external card gateway.
///
/// Implementations must not retry internally; a timeout surfaces as [`GatewayError::Unreachable`] and retry
/// policy belongs to the caller (the gateway redelivers webhooks, customers re-land on the redirect page).
#[allow(async_fn_in_trait)]
pub trait GatewayClient: Clone {
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;
}
