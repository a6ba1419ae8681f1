//! Best-effort in-app notifications.
//!
//! Notification rows are advisory. Creation failures are logged and never
//! abort the flow that asked for them (a failed welcome notification must
//! not roll back a registration).

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{error, Instrument};
use uuid::Uuid;

pub(crate) async fn create_notification(
    pool: &PgPool,
    account_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
    link: Option<&str>,
) -> Result<()> {
    let query = r"
        INSERT INTO notifications (account_id, title, message, kind, link)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(title)
        .bind(message)
        .bind(kind)
        .bind(link)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert notification")?;
    Ok(())
}

/// Create a notification, logging (not propagating) any failure.
pub(crate) async fn best_effort(
    pool: &PgPool,
    account_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
) {
    if let Err(err) = create_notification(pool, account_id, title, message, kind, None).await {
        error!(%account_id, "failed to create notification: {err}");
    }
}
