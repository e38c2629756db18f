//! `SqliteDatabase` is a concrete implementation of a marketplace payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`SettlementDatabase`] trait. The
//! idempotency guards the reconciliation pipeline relies on live in the schema (the unique order-line and
//! notification indexes, and the conditional service-request update), not in this code.
use std::fmt::Debug;

use mps_common::Kobo;
use sqlx::SqlitePool;

use super::db::{audit, intents, notifications, orders, service_requests};
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
    traits::{OrderFieldSet, ServiceSettlement, SettlementDatabase, SettlementError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object with a connection pool of size `max_connections`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        let pool = super::db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        intents::idempotent_insert(intent, &mut conn).await
    }

    async fn fetch_payment_intent(&self, reference: &str) -> Result<Option<PaymentIntent>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let intent = intents::fetch_intent_by_reference(reference, &mut conn).await?;
        Ok(intent)
    }

    async fn update_intent_status(&self, reference: &str, status: IntentStatus) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        intents::update_intent_status(reference, status, &mut conn).await
    }

    async fn fetch_orders_for_reference(&self, reference: &str) -> Result<Vec<Order>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_by_reference(reference, &mut conn).await?;
        Ok(orders)
    }

    /// Inserts the batch in a single transaction so that a mid-batch uniqueness conflict leaves no partial
    /// rows behind for the conflict-path re-read to trip over.
    async fn insert_orders(&self, batch: &[NewOrder], fields: OrderFieldSet) -> Result<Vec<Order>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let inserted = match orders::insert_order_batch(batch, fields, &mut tx).await {
            Ok(rows) => rows,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e);
            },
        };
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_service_request(&self, request: NewServiceRequest) -> Result<ServiceRequest, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        service_requests::insert_service_request(request, &mut conn).await
    }

    async fn fetch_service_request(&self, id: i64) -> Result<Option<ServiceRequest>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let row = service_requests::fetch_service_request(id, &mut conn).await?;
        Ok(row)
    }

    async fn settle_service_request(
        &self,
        id: i64,
        reference: &str,
        amount: Kobo,
    ) -> Result<ServiceSettlement, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        service_requests::settle_service_request(id, reference, amount, &mut conn).await
    }

    async fn notification_exists(
        &self,
        vendor_id: &str,
        reference: &str,
        event_type: NotificationType,
    ) -> Result<bool, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        notifications::notification_exists(vendor_id, reference, event_type, &mut conn).await
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        notifications::insert_notification(notification, &mut conn).await
    }

    async fn fetch_notifications_for_vendor(&self, vendor_id: &str) -> Result<Vec<Notification>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let rows = notifications::fetch_notifications_for_vendor(vendor_id, &mut conn).await?;
        Ok(rows)
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        audit::append_entry(entry, &mut conn).await
    }

    async fn fetch_audit_trail(&self, reference: &str) -> Result<Vec<AuditLogEntry>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let rows = audit::fetch_trail(reference, &mut conn).await?;
        Ok(rows)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}
