//! # Vestia (Identity & Session Service)
//!
//! `vestia` is the identity authority for the Vestia investment platform.
//! It proves "who is calling" and maintains that proof across requests:
//!
//! - **Registration & email verification:** accounts are created `ACTIVE` but
//!   unverified; ownership of the address is proven with short-lived 6-digit
//!   codes before sensitive operations are allowed.
//! - **Login state machine:** password login may terminate in
//!   `needs_email_verification`, `needs_2fa`, or `authenticated`. Flow states
//!   are success-shaped responses, not errors, so clients branch on a field.
//! - **Tokens & sessions:** access and 2FA-challenge tokens are self-contained
//!   signed JWTs validated purely by signature and claims. Refresh tokens are
//!   opaque random values tracked server-side (hash only) and are single-use:
//!   each refresh atomically rotates the token, so a replayed token loses.
//! - **Password reset:** a two-phase verify-then-consume code protocol. The
//!   reset request is anti-enumeration safe: the response never reveals
//!   whether the address exists.
//!
//! Persistent storage is Postgres via `sqlx`; outbound email is a best-effort
//! fire-and-forget dispatch behind the crate's `EmailSender` trait.

pub mod api;
pub mod cli;
