use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{IntentStatus, NewPaymentIntent, PaymentIntent},
    traits::SettlementError,
};

/// Inserts the staged intent, returning the existing row untouched if the reference was already staged.
pub async fn idempotent_insert(
    intent: NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, SettlementError> {
    let result = match fetch_intent_by_reference(&intent.reference, conn).await? {
        Some(existing) => existing,
        None => {
            let intent = insert_intent(intent, conn).await?;
            debug!("📝️ Payment intent [{}] staged with id {}", intent.reference, intent.id);
            intent
        },
    };
    Ok(result)
}

async fn insert_intent(intent: NewPaymentIntent, conn: &mut SqliteConnection) -> Result<PaymentIntent, SettlementError> {
    let pending_orders = match &intent.pending_orders {
        Some(lines) => Some(
            serde_json::to_string(lines)
                .map_err(|e| SettlementError::CorruptStagedPayload(intent.reference.clone(), e.to_string()))?,
        ),
        None => None,
    };
    let delivery = match &intent.delivery {
        Some(d) => Some(
            serde_json::to_string(d)
                .map_err(|e| SettlementError::CorruptStagedPayload(intent.reference.clone(), e.to_string()))?,
        ),
        None => None,
    };
    let row = sqlx::query_as(
        r#"
            INSERT INTO payment_intents (
                reference,
                user_id,
                vendor_id,
                gross_amount,
                food_amount,
                delivery_fee,
                tax_amount,
                currency,
                pending_orders,
                delivery,
                service_request_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(intent.reference)
    .bind(intent.user_id)
    .bind(intent.vendor_id)
    .bind(intent.gross_amount.value())
    .bind(intent.food_amount.value())
    .bind(intent.delivery_fee.value())
    .bind(intent.tax_amount.value())
    .bind(intent.currency)
    .bind(pending_orders)
    .bind(delivery)
    .bind(intent.service_request_id)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_intent_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, sqlx::Error> {
    let intent = sqlx::query_as("SELECT * FROM payment_intents WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(intent)
}

/// Moves the intent to a new status. References with no staged intent are a no-op; verification can run for
/// payments staged elsewhere.
pub async fn update_intent_status(
    reference: &str,
    status: IntentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let status = status.to_string();
    let result = sqlx::query(
        "UPDATE payment_intents SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2",
    )
    .bind(status)
    .bind(reference)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("📝️ No staged intent for [{reference}]; status update skipped");
    }
    Ok(())
}
