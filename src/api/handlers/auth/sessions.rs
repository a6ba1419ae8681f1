//! Refresh-token session registry.
//!
//! Every successful authentication persists one session row keyed by the
//! hash of an opaque refresh token. Rotation is the one hard concurrency
//! contract in the service: the old row is removed with a single
//! `DELETE .. RETURNING` inside the rotation transaction, so of two
//! concurrent callers presenting the same token exactly one gets the row and
//! the other observes not-found. Expired rows are deleted on sighting.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::state::AuthState;
use super::storage::{self, AccountRecord};
use super::tokens::{generate_refresh_token, hash_refresh_token, issue_access_token};
use super::types::SessionSummary;

pub(super) enum RotateOutcome {
    Rotated {
        account_id: Uuid,
        refresh_token: String,
    },
    NotFound,
    Expired,
}

/// Mint an access + refresh pair for the account, persist the refresh
/// session, and record the login. Shared by login, 2FA completion, and
/// email verification (which doubles as a login).
pub(super) async fn open_session(
    pool: &PgPool,
    state: &AuthState,
    account: &AccountRecord,
    device: Option<String>,
) -> Result<(String, String)> {
    let access_token = issue_access_token(
        state.keys(),
        state.config().token_issuer(),
        state.config().access_ttl_seconds(),
        account.id,
        &account.email,
        &account.role,
    )?;
    let refresh_token = create_session(
        pool,
        account.id,
        device,
        state.config().refresh_ttl_seconds(),
    )
    .await?;
    storage::touch_last_login(pool, account.id).await?;
    Ok((access_token, refresh_token))
}

/// Create a session row and return the raw refresh token.
/// Retries on the (vanishingly unlikely) token-hash collision.
pub(super) async fn create_session(
    pool: &PgPool,
    account_id: Uuid,
    device: Option<String>,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO sessions (account_id, token_hash, device, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_refresh_token(&token);
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(&token_hash)
            .bind(&device)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if super::utils::is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Atomically exchange a refresh token for a replacement session.
///
/// The losing racer (or a replayed token) sees `NotFound`. An expired token
/// is reported as `Expired`; its row stays deleted either way.
pub(super) async fn rotate_session(
    pool: &PgPool,
    ttl_seconds: i64,
    old_token: &str,
) -> Result<RotateOutcome> {
    let token_hash = hash_refresh_token(old_token);
    let mut tx = pool.begin().await.context("begin rotation transaction")?;

    let query = r"
        DELETE FROM sessions
        WHERE token_hash = $1
        RETURNING account_id, device, expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to claim session for rotation")?;

    let Some(row) = row else {
        tx.commit().await.context("commit rotation miss")?;
        return Ok(RotateOutcome::NotFound);
    };

    let expires_at: DateTime<Utc> = row.get("expires_at");
    if expires_at <= Utc::now() {
        // Lazy cleanup: commit the delete, reject the exchange.
        tx.commit().await.context("commit expired session cleanup")?;
        return Ok(RotateOutcome::Expired);
    }

    let account_id: Uuid = row.get("account_id");
    let device: Option<String> = row.get("device");

    // The replacement session carries the device label forward and gets a
    // full TTL, not the remainder of the old one.
    let token = generate_refresh_token()?;
    let new_hash = hash_refresh_token(&token);
    let query = r"
        INSERT INTO sessions (account_id, token_hash, device, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(&new_hash)
        .bind(&device)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert rotated session")?;

    tx.commit().await.context("commit rotation")?;
    Ok(RotateOutcome::Rotated {
        account_id,
        refresh_token: token,
    })
}

/// List active sessions for an account, newest first.
pub(super) async fn list_sessions(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Vec<SessionSummary>> {
    let query = r"
        SELECT id, device, created_at, expires_at
        FROM sessions
        WHERE account_id = $1 AND expires_at > NOW()
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(account_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list sessions")?;

    Ok(rows
        .into_iter()
        .map(|row| SessionSummary {
            id: row.get("id"),
            device: row.get("device"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        })
        .collect())
}

/// Delete the session matching a raw refresh token, scoped to the account.
pub(super) async fn delete_session_by_token(
    pool: &PgPool,
    account_id: Uuid,
    token: &str,
) -> Result<()> {
    let token_hash = hash_refresh_token(token);
    let query = "DELETE FROM sessions WHERE account_id = $1 AND token_hash = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(&token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Delete one session by id, scoped to the account (no cross-account revocation).
pub(super) async fn delete_session_by_id(
    pool: &PgPool,
    account_id: Uuid,
    session_id: Uuid,
) -> Result<bool> {
    let query = "DELETE FROM sessions WHERE account_id = $1 AND id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .bind(session_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session by id")?;
    Ok(result.rows_affected() > 0)
}

/// Delete every session for the account ("logout everywhere", explicit opt-in).
pub(super) async fn delete_account_sessions(pool: &PgPool, account_id: Uuid) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE account_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete account sessions")?;
    Ok(result.rows_affected())
}
