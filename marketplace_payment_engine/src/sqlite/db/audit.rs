use sqlx::SqliteConnection;

use crate::{
    db_types::{AuditLogEntry, NewAuditEntry},
    traits::SettlementError,
};

/// Appends a stage record. There is deliberately no update or delete counterpart anywhere in this module;
/// the audit log is the one table that only ever grows.
pub async fn append_entry(entry: NewAuditEntry, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let payload = entry.payload.to_string();
    sqlx::query(
        r#"
            INSERT INTO audit_log (reference, stage, actor, payload)
            VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(entry.reference)
    .bind(entry.stage.to_string())
    .bind(entry.actor.to_string())
    .bind(payload)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_trail(reference: &str, conn: &mut SqliteConnection) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM audit_log WHERE reference = $1 ORDER BY id ASC")
        .bind(reference)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
