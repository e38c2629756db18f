use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mps_common::Kobo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------    IntentStatus      ---------------------------------------------------------
/// Lifecycle of a staged checkout. Intents are never deleted; a `Failed` intent is kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum IntentStatus {
    /// Checkout has been staged; no verification attempt has completed yet.
    Created,
    /// A verification run has confirmed the charge but materialization has not finished.
    Verifying,
    /// Orders (or the service request transition) exist for this intent.
    Settled,
    /// The gateway reported the charge as failed.
    Failed,
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentStatus::Created => write!(f, "Created"),
            IntentStatus::Verifying => write!(f, "Verifying"),
            IntentStatus::Settled => write!(f, "Settled"),
            IntentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for IntentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Verifying" => Ok(Self::Verifying),
            "Settled" => Ok(Self::Settled),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid intent status: {s}"))),
        }
    }
}

//--------------------------------------   StagedLineItem     ---------------------------------------------------------
/// One vendor line inside a staged checkout. `vendor_id` and `product_id` are optional at this boundary so a
/// malformed line can be dropped with a logged reason instead of sinking the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedLineItem {
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub total_price: Kobo,
}

fn default_quantity() -> i64 {
    1
}

//--------------------------------------   DeliveryDetails    ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zone: Option<String>,
    pub phone: Option<String>,
    pub delivery_charge: Option<Kobo>,
}

//--------------------------------------    PaymentIntent     ---------------------------------------------------------
/// A staged, not-yet-settled checkout, keyed by the gateway reference.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntent {
    pub id: i64,
    pub reference: String,
    pub user_id: String,
    pub vendor_id: Option<String>,
    pub gross_amount: Kobo,
    pub food_amount: Kobo,
    pub delivery_fee: Kobo,
    pub tax_amount: Kobo,
    pub currency: String,
    /// JSON array of [`StagedLineItem`]s, as staged at checkout time.
    pub pending_orders: Option<String>,
    /// JSON [`DeliveryDetails`].
    pub delivery: Option<String>,
    pub service_request_id: Option<i64>,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn staged_lines(&self) -> Result<Vec<StagedLineItem>, serde_json::Error> {
        match self.pending_orders.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(json) => serde_json::from_str(json),
        }
    }

    pub fn delivery_details(&self) -> Result<Option<DeliveryDetails>, serde_json::Error> {
        match self.delivery.as_deref() {
            None | Some("") => Ok(None),
            Some(json) => serde_json::from_str(json).map(Some),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub reference: String,
    pub user_id: String,
    pub vendor_id: Option<String>,
    pub gross_amount: Kobo,
    pub food_amount: Kobo,
    pub delivery_fee: Kobo,
    pub tax_amount: Kobo,
    pub currency: String,
    pub pending_orders: Option<Vec<StagedLineItem>>,
    pub delivery: Option<DeliveryDetails>,
    pub service_request_id: Option<i64>,
}

impl NewPaymentIntent {
    pub fn new(reference: String, user_id: String, gross_amount: Kobo) -> Self {
        Self {
            reference,
            user_id,
            vendor_id: None,
            gross_amount,
            food_amount: Kobo::default(),
            delivery_fee: Kobo::default(),
            tax_amount: Kobo::default(),
            currency: mps_common::NAIRA_CURRENCY_CODE.to_string(),
            pending_orders: None,
            delivery: None,
            service_request_id: None,
        }
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Materialized and waiting for the vendor to accept it.
    Pending,
    /// Accepted by the vendor and in preparation / delivery.
    Accepted,
    /// Fulfilled.
    Delivered,
    /// Cancelled by the vendor or an admin after materialization.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Accepted => write!(f, "Accepted"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
/// A materialized, vendor-scoped unit of fulfillment. The set of orders for a payment reference is created at
/// most once; `(payment_reference, line_no)` is unique at the store level.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub payment_reference: String,
    pub line_no: i64,
    pub user_id: String,
    pub vendor_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub total_price: Kobo,
    pub tax_share: Kobo,
    pub delivery_address: Option<String>,
    pub delivery_city: Option<String>,
    pub delivery_state: Option<String>,
    pub delivery_zone: Option<String>,
    pub delivery_phone: Option<String>,
    pub delivery_charge: Option<Kobo>,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payment_reference: String,
    pub line_no: i64,
    pub user_id: String,
    pub vendor_id: String,
    pub product_id: Option<String>,
    pub quantity: i64,
    pub total_price: Kobo,
    pub tax_share: Kobo,
    pub delivery: DeliveryDetails,
}

//--------------------------------------   ServiceRequest     ---------------------------------------------------------
/// A booked service. Settlement is a single conditional `unpaid -> paid` transition; every other lifecycle
/// change belongs to the (out of scope) vendor workflows.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRequest {
    pub id: i64,
    pub user_id: String,
    pub vendor_id: String,
    pub description: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub amount_paid: Option<Kobo>,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub user_id: String,
    pub vendor_id: String,
    pub description: Option<String>,
}

//--------------------------------------   NotificationType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum NotificationType {
    NewOrder,
    PaymentReceived,
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::NewOrder => write!(f, "NewOrder"),
            NotificationType::PaymentReceived => write!(f, "PaymentReceived"),
        }
    }
}

//--------------------------------------     Notification     ---------------------------------------------------------
/// A vendor inbox entry. At most one notification exists per (vendor, reference, type); the dedup check is
/// store-backed because concurrent verification runs may live in different processes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub vendor_id: String,
    pub event_type: NotificationType,
    pub message: String,
    pub payment_reference: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub vendor_id: String,
    pub event_type: NotificationType,
    pub message: String,
    pub payment_reference: String,
}

//--------------------------------------     TriggerSource    ---------------------------------------------------------
/// Who kicked off a verification run. Recorded in every audit entry so a reference's history can be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    /// The customer's browser landing back on the marketplace after checkout.
    Redirect,
    /// The gateway's asynchronous server-to-server callback.
    Webhook,
}

impl Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Redirect => write!(f, "redirect"),
            TriggerSource::Webhook => write!(f, "webhook"),
        }
    }
}

//--------------------------------------      AuditStage      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AuditStage {
    Received,
    GatewayVerified,
    GatewayRejected,
    GatewayUnreachable,
    Allocated,
    AllocationMismatch,
    LineDropped,
    Materialized,
    MaterializationFailed,
    Notified,
    Done,
}

impl Display for AuditStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditStage::Received => "Received",
            AuditStage::GatewayVerified => "GatewayVerified",
            AuditStage::GatewayRejected => "GatewayRejected",
            AuditStage::GatewayUnreachable => "GatewayUnreachable",
            AuditStage::Allocated => "Allocated",
            AuditStage::AllocationMismatch => "AllocationMismatch",
            AuditStage::LineDropped => "LineDropped",
            AuditStage::Materialized => "Materialized",
            AuditStage::MaterializationFailed => "MaterializationFailed",
            AuditStage::Notified => "Notified",
            AuditStage::Done => "Done",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------    AuditLogEntry     ---------------------------------------------------------
/// Append-only forensic record. One row per pipeline stage per invocation, failure paths included. Rows are
/// never updated or deleted.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    pub reference: String,
    pub stage: AuditStage,
    pub actor: String,
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn payload_json(&self) -> Option<Value> {
        self.payload.as_deref().and_then(|p| serde_json::from_str(p).ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub reference: String,
    pub stage: AuditStage,
    pub actor: TriggerSource,
    pub payload: Value,
}

impl NewAuditEntry {
    pub fn new(reference: &str, stage: AuditStage, actor: TriggerSource, payload: Value) -> Self {
        Self { reference: reference.to_string(), stage, actor, payload }
    }
}
