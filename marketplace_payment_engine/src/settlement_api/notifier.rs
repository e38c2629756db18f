//! Vendor notification dispatch.
//!
//! Everything in this module is best-effort: a missed notification must not undo a successful payment, so
//! failures are logged and swallowed. Deduplication is a store existence check scoped to
//! (vendor, reference, type) — never process-local state, since the duplicate invocation may be running in a
//! different process entirely.

use std::collections::BTreeMap;

use log::{debug, warn};
use mps_common::Kobo;

use crate::{
    db_types::{NewNotification, NotificationType, Order, ServiceRequest},
    traits::SettlementDatabase,
};

/// Creates one "new order" notification per vendor appearing in `orders`, grouping that vendor's lines into a
/// single message with a count. Returns the number of notifications actually inserted.
pub async fn notify_order_vendors<B: SettlementDatabase>(db: &B, reference: &str, orders: &[Order]) -> usize {
    let mut per_vendor: BTreeMap<&str, usize> = BTreeMap::new();
    for order in orders {
        *per_vendor.entry(order.vendor_id.as_str()).or_default() += 1;
    }
    let mut created = 0;
    for (vendor_id, count) in per_vendor {
        match db.notification_exists(vendor_id, reference, NotificationType::NewOrder).await {
            Ok(true) => {
                debug!("🔔️ Vendor {vendor_id} was already notified for [{reference}]; skipping");
                continue;
            },
            Ok(false) => {},
            Err(e) => {
                warn!("🔔️ Could not check notification state for vendor {vendor_id} [{reference}]: {e}");
                continue;
            },
        }
        let message = if count == 1 {
            format!("You have a new paid order (ref {reference})")
        } else {
            format!("You have {count} new paid orders (ref {reference})")
        };
        let notification = NewNotification {
            vendor_id: vendor_id.to_string(),
            event_type: NotificationType::NewOrder,
            message,
            payment_reference: reference.to_string(),
        };
        match db.insert_notification(notification).await {
            Ok(_) => created += 1,
            Err(e) => {
                // A unique-index race with a concurrent invocation lands here too; either way the vendor
                // has exactly one notification, so log and move on.
                warn!("🔔️ Could not notify vendor {vendor_id} for [{reference}]: {e}");
            },
        }
    }
    created
}

/// Notifies the vendor behind a settled service request that the payment arrived.
pub async fn notify_service_vendor<B: SettlementDatabase>(
    db: &B,
    reference: &str,
    request: &ServiceRequest,
    amount: Kobo,
) -> usize {
    let vendor_id = request.vendor_id.as_str();
    match db.notification_exists(vendor_id, reference, NotificationType::PaymentReceived).await {
        Ok(true) => {
            debug!("🔔️ Vendor {vendor_id} was already notified for [{reference}]; skipping");
            return 0;
        },
        Ok(false) => {},
        Err(e) => {
            warn!("🔔️ Could not check notification state for vendor {vendor_id} [{reference}]: {e}");
            return 0;
        },
    }
    let notification = NewNotification {
        vendor_id: vendor_id.to_string(),
        event_type: NotificationType::PaymentReceived,
        message: format!("Payment of {amount} received for service request #{} (ref {reference})", request.id),
        payment_reference: reference.to_string(),
    };
    match db.insert_notification(notification).await {
        Ok(_) => 1,
        Err(e) => {
            warn!("🔔️ Could not notify vendor {vendor_id} for [{reference}]: {e}");
            0
        },
    }
}
