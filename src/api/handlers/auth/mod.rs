//! Identity and session endpoints.
//!
//! Registration, email verification, password + 2FA login, password reset,
//! and the refresh-token session registry. Handlers stay thin; the decision
//! logic lives in pure functions (`login::decide`, `codes::check_code`) and
//! the storage layer wraps every statement in a `db.query` span.

mod codes;
mod error;
pub(crate) mod login;
mod password;
pub mod principal;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod session;
mod sessions;
mod state;
pub(crate) mod storage;
mod tokens;
pub(crate) mod twofactor;
mod types;
mod utils;
pub(crate) mod verification;

pub use error::{AuthError, ErrorBody};
pub use rate_limit::{NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter};
pub use state::{AuthConfig, AuthState};
pub use types::{
    AccountResponse, AuthenticatedResponse, EmailRequest, LoginRequest, LoginResponse,
    LogoutRequest, MessageResponse, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    SessionSummary, TwoFactorRequest, VerifyEmailRequest, VerifyResetCodeRequest,
};
