use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ledgerchat", version, about = "Ask questions about your QuickBooks invoices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Show whether a QuickBooks credential is stored.
    Status(CredentialsArg),

    /// Ask one question with an empty history.
    Ask {
        /// The question.
        text: String,

        #[command(flatten)]
        credentials: CredentialsArg,
    },

    /// Remove the stored credential.
    Disconnect(CredentialsArg),
}

#[derive(Args, Debug)]
pub struct CredentialsArg {
    /// Credential file (defaults to the user config directory).
    #[arg(long = "credentials", env = "LEDGERCHAT_CREDENTIALS_FILE")]
    pub path: Option<PathBuf>,
}
