use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order},
    traits::{OrderFieldSet, SettlementError},
};

/// Returns all orders materialized for the given reference, in line order.
pub async fn fetch_orders_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1 ORDER BY line_no ASC")
        .bind(reference)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Inserts one order row. Not atomic on its own; the caller wraps the batch in a transaction and passes
/// `&mut *tx` as the connection argument.
///
/// With [`OrderFieldSet::Mandatory`] the optional delivery and tax columns are left to their defaults, which
/// is the reduced-shape retry path for stores whose orders table has drifted.
pub async fn insert_order(
    order: &NewOrder,
    fields: OrderFieldSet,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementError> {
    let order: Order = match fields {
        OrderFieldSet::Full => {
            sqlx::query_as(
                r#"
                    INSERT INTO orders (
                        payment_reference,
                        line_no,
                        user_id,
                        vendor_id,
                        product_id,
                        quantity,
                        total_price,
                        tax_share,
                        delivery_address,
                        delivery_city,
                        delivery_state,
                        delivery_zone,
                        delivery_phone,
                        delivery_charge
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    RETURNING *;
                "#,
            )
            .bind(&order.payment_reference)
            .bind(order.line_no)
            .bind(&order.user_id)
            .bind(&order.vendor_id)
            .bind(&order.product_id)
            .bind(order.quantity)
            .bind(order.total_price.value())
            .bind(order.tax_share.value())
            .bind(&order.delivery.address)
            .bind(&order.delivery.city)
            .bind(&order.delivery.state)
            .bind(&order.delivery.zone)
            .bind(&order.delivery.phone)
            .bind(order.delivery.delivery_charge.map(|c| c.value()))
            .fetch_one(conn)
            .await?
        },
        OrderFieldSet::Mandatory => {
            sqlx::query_as(
                r#"
                    INSERT INTO orders (
                        payment_reference,
                        line_no,
                        user_id,
                        vendor_id,
                        product_id,
                        quantity,
                        total_price
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING *;
                "#,
            )
            .bind(&order.payment_reference)
            .bind(order.line_no)
            .bind(&order.user_id)
            .bind(&order.vendor_id)
            .bind(&order.product_id)
            .bind(order.quantity)
            .bind(order.total_price.value())
            .fetch_one(conn)
            .await?
        },
    };
    trace!("📝️ Order line {} for [{}] inserted", order.line_no, order.payment_reference);
    Ok(order)
}

/// Inserts the batch inside the given transaction-scoped connection. The caller owns commit/rollback; any
/// error here must roll the whole batch back so a conflicting concurrent insert leaves no partial rows.
pub async fn insert_order_batch(
    orders: &[NewOrder],
    fields: OrderFieldSet,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementError> {
    let mut inserted = Vec::with_capacity(orders.len());
    for order in orders {
        let row = insert_order(order, fields, conn).await?;
        inserted.push(row);
    }
    debug!(
        "📝️ {} order line(s) materialized for [{}]",
        inserted.len(),
        orders.first().map(|o| o.payment_reference.as_str()).unwrap_or("?")
    );
    Ok(inserted)
}
