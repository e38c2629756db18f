use mps_common::Kobo;
use thiserror::Error;

use crate::{
    db_types::{
        AuditLogEntry,
        IntentStatus,
        NewAuditEntry,
        NewNotification,
        NewOrder,
        NewPaymentIntent,
        NewServiceRequest,
        Notification,
        NotificationType,
        Order,
        PaymentIntent,
        ServiceRequest,
    },
    traits::{data_objects::OrderFieldSet, ServiceSettlement},
};

/// This trait defines the storage behaviour backing the payment reconciliation engine.
///
/// This behaviour includes:
/// * Staging and mutating payment intents
/// * Idempotent order materialization for a payment reference
/// * The atomic service-request settlement transition
/// * Vendor notification writes with store-backed deduplication
/// * The append-only audit log
///
/// The engine holds no state between invocations; every idempotency guarantee in the pipeline rests on the
/// constraints this trait's implementations enforce in the store.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stage a new payment intent. Idempotent on the reference: if an intent with this reference already
    /// exists it is returned unchanged and nothing is written.
    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, SettlementError>;

    /// Fetch the staged intent for a reference, if any.
    async fn fetch_payment_intent(&self, reference: &str) -> Result<Option<PaymentIntent>, SettlementError>;

    /// Move an intent to a new lifecycle status. Unknown references are a no-op (verification may legitimately
    /// run for references staged by another deployment).
    async fn update_intent_status(&self, reference: &str, status: IntentStatus) -> Result<(), SettlementError>;

    /// All orders previously materialized for the reference, in line order.
    async fn fetch_orders_for_reference(&self, reference: &str) -> Result<Vec<Order>, SettlementError>;

    /// Insert the given order rows in a single transaction.
    ///
    /// * A uniqueness conflict (a concurrent invocation materialized first) rolls the transaction back and
    ///   surfaces as [`SettlementError::DuplicateMaterialization`]; the caller re-reads by reference.
    /// * A schema-shape problem surfaces as [`SettlementError::SchemaMismatch`]; the caller retries once with
    ///   [`OrderFieldSet::Mandatory`].
    async fn insert_orders(&self, orders: &[NewOrder], fields: OrderFieldSet) -> Result<Vec<Order>, SettlementError>;

    /// Create a service request in its unpaid state. Used by the booking flow (and test setups); settlement
    /// only ever updates these rows.
    async fn insert_service_request(&self, request: NewServiceRequest) -> Result<ServiceRequest, SettlementError>;

    async fn fetch_service_request(&self, id: i64) -> Result<Option<ServiceRequest>, SettlementError>;

    /// Atomically transition a service request to `paid`, recording the amount and reference.
    ///
    /// The update is conditional on the row not already being `paid`, which makes the transition idempotent
    /// under concurrent duplicate invocation without any locking. An already-paid row is reported via
    /// [`ServiceSettlement::already_paid`], not as an error.
    async fn settle_service_request(
        &self,
        id: i64,
        reference: &str,
        amount: Kobo,
    ) -> Result<ServiceSettlement, SettlementError>;

    /// Whether a notification of this type already exists for (vendor, reference).
    async fn notification_exists(
        &self,
        vendor_id: &str,
        reference: &str,
        event_type: NotificationType,
    ) -> Result<bool, SettlementError>;

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, SettlementError>;

    /// Unread-first inbox view for a vendor. Consumed by vendor dashboards (out of scope) and tests.
    async fn fetch_notifications_for_vendor(&self, vendor_id: &str) -> Result<Vec<Notification>, SettlementError>;

    /// Append a stage record to the audit log. Never updates or deletes.
    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> Result<(), SettlementError>;

    /// Full stage history for a reference, oldest first.
    async fn fetch_audit_trail(&self, reference: &str) -> Result<Vec<AuditLogEntry>, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    /// The store's uniqueness constraint fired: another invocation materialized this reference first.
    #[error("Orders for this reference were materialized by a concurrent invocation")]
    DuplicateMaterialization,
    /// The store's shape does not match what we tried to write (missing/unexpected column).
    #[error("Storage schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Every staged line was invalid; there is nothing to materialize.
    #[error("No valid order lines to materialize for reference {0}")]
    EmptyMaterialization(String),
    /// Confirmed payment whose orders could not be created. Escalated, never silently dropped.
    #[error("Materialization failed for a confirmed payment: {0}")]
    MaterializationFailure(String),
    #[error("The requested service request {0} does not exist")]
    ServiceRequestNotFound(i64),
    #[error("The staged payload for reference {0} could not be parsed: {1}")]
    CorruptStagedPayload(String, String),
    #[error("{0}")]
    Gateway(#[from] crate::traits::GatewayError),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => SettlementError::DuplicateMaterialization,
            sqlx::Error::ColumnNotFound(col) => SettlementError::SchemaMismatch(format!("column not found: {col}")),
            sqlx::Error::ColumnDecode { index, source } => {
                SettlementError::SchemaMismatch(format!("could not decode column {index}: {source}"))
            },
            _ => SettlementError::DatabaseError(e.to_string()),
        }
    }
}
