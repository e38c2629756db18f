use sqlx::SqliteConnection;

use crate::{
    db_types::{NewNotification, Notification, NotificationType},
    traits::SettlementError,
};

pub async fn notification_exists(
    vendor_id: &str,
    reference: &str,
    event_type: NotificationType,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE vendor_id = $1 AND payment_reference = $2 AND event_type = $3",
    )
    .bind(vendor_id)
    .bind(reference)
    .bind(event_type.to_string())
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, SettlementError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO notifications (vendor_id, event_type, message, payment_reference)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(notification.vendor_id)
    .bind(notification.event_type.to_string())
    .bind(notification.message)
    .bind(notification.payment_reference)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_notifications_for_vendor(
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let rows = sqlx::query_as(
        "SELECT * FROM notifications WHERE vendor_id = $1 ORDER BY read ASC, created_at DESC",
    )
    .bind(vendor_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
