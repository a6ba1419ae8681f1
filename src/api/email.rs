//! Outbound email delivery abstraction.
//!
//! Verification and reset codes are dispatched fire-and-forget: the sending
//! task is spawned, the caller's response never waits on it, and failures are
//! logged rather than surfaced. Retry/backoff, if wanted, belongs to the
//! `EmailSender` implementation, not to the flows that enqueue here.
//!
//! The default sender for local dev is [`LogEmailSender`], which logs the
//! payload and returns `Ok(())`.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// Email delivery abstraction. Implementations must not block for long;
/// they run on the async runtime's blocking-tolerant spawn.
pub trait EmailSender: Send + Sync {
    fn send_verification_email(&self, email: &str, code: &str) -> Result<()>;
    fn send_password_reset_email(&self, email: &str, code: &str) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send_verification_email(&self, email: &str, code: &str) -> Result<()> {
        info!(to_email = %email, code = %code, "verification email send stub");
        Ok(())
    }

    fn send_password_reset_email(&self, email: &str, code: &str) -> Result<()> {
        info!(to_email = %email, code = %code, "password reset email send stub");
        Ok(())
    }
}

/// One message on its way out.
#[derive(Clone, Debug)]
pub(crate) enum OutboundEmail {
    Verification { email: String, code: String },
    PasswordReset { email: String, code: String },
}

/// Fire-and-forget dispatch. Never blocks or fails the caller.
pub(crate) fn dispatch(sender: Arc<dyn EmailSender>, message: OutboundEmail) {
    tokio::spawn(async move {
        let result = match &message {
            OutboundEmail::Verification { email, code } => {
                sender.send_verification_email(email, code)
            }
            OutboundEmail::PasswordReset { email, code } => {
                sender.send_password_reset_email(email, code)
            }
        };
        if let Err(err) = result {
            match message {
                OutboundEmail::Verification { email, .. } => {
                    error!(to_email = %email, "failed to send verification email: {err}");
                }
                OutboundEmail::PasswordReset { email, .. } => {
                    error!(to_email = %email, "failed to send password reset email: {err}");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        assert!(sender
            .send_verification_email("alice@example.com", "123456")
            .is_ok());
        assert!(sender
            .send_password_reset_email("alice@example.com", "654321")
            .is_ok());
    }

    #[tokio::test]
    async fn dispatch_does_not_block_the_caller() {
        let sender: Arc<dyn EmailSender> = Arc::new(LogEmailSender);
        dispatch(
            sender,
            OutboundEmail::Verification {
                email: "alice@example.com".to_string(),
                code: "123456".to_string(),
            },
        );
        // Nothing to await; the call returns immediately.
    }
}
