//! Short-lived numeric verification codes.
//!
//! The same code shape backs email verification and password reset. A code is
//! only ever stored on the owning account row, so issuing a new one overwrites
//! (and thereby invalidates) the previous one.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

pub(super) const CODE_LEN: usize = 6;

// Largest multiple of 1_000_000 that fits in a u32; draws at or above it are
// rejected so the modulo stays uniform.
const CODE_REJECTION_BOUND: u32 = 4_294_000_000;

/// Generate a uniformly random 6-digit code, leading zeros preserved.
pub(super) fn generate_code() -> Result<String> {
    loop {
        let mut raw = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut raw)
            .context("failed to draw verification code")?;
        let value = u32::from_be_bytes(raw);
        if value < CODE_REJECTION_BOUND {
            return Ok(format!("{:06}", value % 1_000_000));
        }
    }
}

/// True when `submitted` has the expected 6-digit numeric shape.
pub(super) fn code_shape_ok(submitted: &str) -> bool {
    submitted.len() == CODE_LEN && submitted.bytes().all(|byte| byte.is_ascii_digit())
}

/// Validate a submitted code against the stored code and its expiry.
///
/// Read-only: consuming the code is the caller's own storage update. The
/// clock is injected so expiry is testable.
pub(super) fn check_code(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    submitted: &str,
    now: DateTime<Utc>,
) -> bool {
    if !code_shape_ok(submitted) {
        return false;
    }
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return false;
    };
    expires_at > now && stored == submitted
}
