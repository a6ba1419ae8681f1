//! Actions the `vestia` binary can carry out after argument parsing.

pub mod server;

mod run;

/// A fully resolved command, ready to run.
#[derive(Debug)]
pub enum Action {
    /// Serve the identity API over HTTP.
    Server(server::Args),
}

impl Action {
    /// Run the action to completion.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
