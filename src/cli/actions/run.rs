use crate::cli::actions::{server, Action};
use anyhow::Result;

/// Dispatch an [`Action`] to its implementation. New variants get their arm
/// here and an `execute` in their own module.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
    }
}
