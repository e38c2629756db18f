use log::debug;
use mps_common::Kobo;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewServiceRequest, ServiceRequest},
    traits::{ServiceSettlement, SettlementError},
};

pub async fn insert_service_request(
    request: NewServiceRequest,
    conn: &mut SqliteConnection,
) -> Result<ServiceRequest, SettlementError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO service_requests (user_id, vendor_id, description)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(request.user_id)
    .bind(request.vendor_id)
    .bind(request.description)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_service_request(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ServiceRequest>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM service_requests WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row)
}

/// The `unpaid -> paid` transition. The WHERE clause makes the update itself the idempotency guard: of two
/// concurrent settlements, exactly one matches a row and the other observes `already_paid`.
pub async fn settle_service_request(
    id: i64,
    reference: &str,
    amount: Kobo,
    conn: &mut SqliteConnection,
) -> Result<ServiceSettlement, SettlementError> {
    let result = sqlx::query(
        r#"
            UPDATE service_requests SET
                payment_status = 'paid',
                amount_paid = $1,
                payment_reference = $2,
                paid_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND payment_status != 'paid'
        "#,
    )
    .bind(amount.value())
    .bind(reference)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        debug!("📝️ Service request #{id} settled by [{reference}]");
        return Ok(ServiceSettlement { service_request_id: id, already_paid: false });
    }
    // Nothing updated: either the request is already paid, or it does not exist at all.
    match fetch_service_request(id, conn).await? {
        Some(_) => {
            debug!("📝️ Service request #{id} was already paid; [{reference}] is a duplicate settlement");
            Ok(ServiceSettlement { service_request_id: id, already_paid: true })
        },
        None => Err(SettlementError::ServiceRequestNotFound(id)),
    }
}
