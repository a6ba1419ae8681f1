//! Database helpers for account state.
//!
//! Verification and reset codes live on the account row itself, so issuing a
//! new code is a plain UPDATE that overwrites (and invalidates) the previous
//! one. Concurrent issuance races are last-write-wins by design.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;

pub(super) const ROLE_USER: &str = "USER";
pub(super) const STATUS_ACTIVE: &str = "ACTIVE";
pub(super) const STATUS_SUSPENDED: &str = "SUSPENDED";

const ACCOUNT_COLUMNS: &str = r"
    id, email, password_hash, role, status, email_verified,
    verification_code, verification_expires_at, reset_code, reset_expires_at,
    two_factor_enabled, first_name, last_name, phone, country, kyc_status,
    referral_code, referred_by, created_at, last_login
";

/// One account row, codes and hash included. Never serialized directly;
/// responses go through the sanitized projection.
#[derive(Debug, Clone)]
pub(crate) struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub status: String,
    pub email_verified: bool,
    pub verification_code: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub reset_code: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub two_factor_enabled: bool,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub kyc_status: String,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

pub(super) struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub verification_code: String,
    pub verification_expires_at: DateTime<Utc>,
}

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum InsertOutcome {
    Created(Box<AccountRecord>),
    DuplicateEmail,
}

fn account_from_row(row: &PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        status: row.get("status"),
        email_verified: row.get("email_verified"),
        verification_code: row.get("verification_code"),
        verification_expires_at: row.get("verification_expires_at"),
        reset_code: row.get("reset_code"),
        reset_expires_at: row.get("reset_expires_at"),
        two_factor_enabled: row.get("two_factor_enabled"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        country: row.get("country"),
        kyc_status: row.get("kyc_status"),
        referral_code: row.get("referral_code"),
        referred_by: row.get("referred_by"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }
}

pub(super) async fn lookup_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;
    Ok(row.as_ref().map(account_from_row))
}

pub(crate) async fn lookup_account_by_id(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;
    Ok(row.as_ref().map(account_from_row))
}

/// Resolve a referral code to the referring account id.
/// A code that matches no account is not an error; the caller ignores it.
pub(super) async fn lookup_referrer_id(
    pool: &PgPool,
    referral_code: &str,
) -> Result<Option<Uuid>> {
    let query = "SELECT id FROM accounts WHERE referral_code = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(referral_code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to resolve referral code")?;
    Ok(row.map(|row| row.get("id")))
}

pub(super) async fn insert_account(pool: &PgPool, new: &NewAccount) -> Result<InsertOutcome> {
    let query = format!(
        r"
        INSERT INTO accounts
            (email, password_hash, first_name, last_name, phone, country,
             referral_code, referred_by, verification_code, verification_expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ACCOUNT_COLUMNS}
        "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(&new.country)
        .bind(&new.referral_code)
        .bind(new.referred_by)
        .bind(&new.verification_code)
        .bind(new.verification_expires_at)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(Box::new(account_from_row(&row)))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::DuplicateEmail),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

/// Store a fresh verification code, overwriting any outstanding one.
pub(super) async fn set_verification_code(
    pool: &PgPool,
    account_id: Uuid,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET verification_code = $2, verification_expires_at = $3
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(code)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store verification code")?;
    Ok(())
}

/// Mark the email verified and consume the outstanding code in one statement.
pub(super) async fn mark_email_verified(pool: &PgPool, account_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET email_verified = TRUE,
            verification_code = NULL,
            verification_expires_at = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

/// Store a fresh password-reset code, overwriting any outstanding one.
pub(super) async fn set_reset_code(
    pool: &PgPool,
    account_id: Uuid,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET reset_code = $2, reset_expires_at = $3
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(code)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store reset code")?;
    Ok(())
}

/// Persist the new password hash and consume the reset code in one statement.
pub(super) async fn update_password(
    pool: &PgPool,
    account_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE accounts
        SET password_hash = $2,
            reset_code = NULL,
            reset_expires_at = NULL
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

pub(super) async fn touch_last_login(pool: &PgPool, account_id: Uuid) -> Result<()> {
    let query = "UPDATE accounts SET last_login = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(
            format!("{:?}", InsertOutcome::DuplicateEmail),
            "DuplicateEmail"
        );
    }

    #[test]
    fn account_columns_cover_the_record() {
        // Guard against a column slipping out of the shared SELECT list.
        for column in [
            "password_hash",
            "verification_code",
            "reset_expires_at",
            "two_factor_enabled",
            "referral_code",
            "referred_by",
            "kyc_status",
            "last_login",
        ] {
            assert!(ACCOUNT_COLUMNS.contains(column), "missing {column}");
        }
    }
}
