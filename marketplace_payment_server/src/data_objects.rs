use std::fmt::Display;

use marketplace_payment_engine::{
    db_types::{DeliveryDetails, StagedLineItem},
    helpers::CommissionSplit,
    settlement_api::{Disposition, SettlementOutcome},
};
use mps_common::Kobo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Trigger A: the customer's browser landing back on the marketplace. The cart may be posted inline; when it
/// is omitted the pipeline falls back to the staged intent.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub reference: String,
    #[serde(default)]
    pub pending_orders: Option<Vec<StagedLineItem>>,
    #[serde(default)]
    pub delivery_details: Option<DeliveryDetails>,
}

/// Stages a checkout intent ahead of the gateway charge.
#[derive(Debug, Clone, Deserialize)]
pub struct InitCheckoutRequest {
    pub reference: String,
    pub user_id: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    pub gross_amount: Kobo,
    #[serde(default)]
    pub food_amount: Option<Kobo>,
    #[serde(default)]
    pub delivery_fee: Option<Kobo>,
    #[serde(default)]
    pub tax_amount: Option<Kobo>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub pending_orders: Option<Vec<StagedLineItem>>,
    #[serde(default)]
    pub delivery_details: Option<DeliveryDetails>,
    #[serde(default)]
    pub service_request_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitCheckoutResponse {
    pub success: bool,
    pub reference: String,
    pub split: CommissionSplit,
}

/// Trigger B: the gateway's signed webhook payload. Only `charge.success` is acted on; anything else is
/// acknowledged and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
}

/// The response contract shared by both triggers. A failure after the gateway has confirmed the charge
/// carries `payment_likely_successful: true` so no caller can mistake it for "money not received".
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResponse {
    pub success: bool,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Kobo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<Kobo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders_created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_request_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_likely_successful: Option<bool>,
}

impl SettlementResponse {
    pub fn from_outcome(outcome: &SettlementOutcome) -> Self {
        match &outcome.disposition {
            Disposition::Degraded { reason } => Self {
                success: false,
                reference: outcome.reference.clone(),
                amount: Some(outcome.amount),
                commission: Some(outcome.split.commission),
                orders_created: None,
                service_request_id: None,
                error: Some(format!("Payment received; orders pending manual review. {reason}")),
                payment_likely_successful: Some(true),
            },
            _ => Self {
                success: true,
                reference: outcome.reference.clone(),
                amount: Some(outcome.amount),
                commission: Some(outcome.split.commission),
                orders_created: outcome.orders_created(),
                service_request_id: outcome.service_request_id(),
                error: None,
                payment_likely_successful: None,
            },
        }
    }

    pub fn failure<S: Display>(reference: &str, error: S) -> Self {
        Self {
            success: false,
            reference: reference.to_string(),
            amount: None,
            commission: None,
            orders_created: None,
            service_request_id: None,
            error: Some(error.to_string()),
            payment_likely_successful: None,
        }
    }
}
