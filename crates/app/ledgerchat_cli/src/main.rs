// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands, CredentialsArg};
use ledgerchat_core::Assistant;
use ledgerchat_core::config::LedgerConfig;
use ledgerchat_core::credential::{CredentialStore, FileCredentialStore};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Status(credentials) => {
            let store = open_store(credentials)?;
            block_on(status(&store))??;
        }
        Commands::Ask { text, credentials } => {
            let store = open_store(credentials)?;
            block_on(ask(Arc::new(store), text))??;
        }
        Commands::Disconnect(credentials) => {
            let store = open_store(credentials)?;
            block_on(store.clear())??;
            println!("disconnected");
        }
    }

    Ok(())
}

fn open_store(arg: &CredentialsArg) -> Result<FileCredentialStore> {
    let path: PathBuf = match &arg.path {
        Some(path) => path.clone(),
        None => FileCredentialStore::default_path()
            .ok_or_else(|| Error::Custom("no config directory; pass --credentials".into()))?,
    };
    log::debug!("credential file: {}", path.display());
    Ok(FileCredentialStore::new(path))
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

async fn status(store: &FileCredentialStore) -> Result<()> {
    match store.load().await? {
        Some(credential) => println!(
            "connected {} (expires {})",
            credential.account_id,
            credential.expires_at.to_rfc3339()
        ),
        None => println!("not connected"),
    }
    Ok(())
}

async fn ask(store: Arc<FileCredentialStore>, text: &str) -> Result<()> {
    let config = LedgerConfig::from_env();
    let assistant = Assistant::new(&config, store)?;

    let credential = assistant.stored_credential().await?;
    if credential.is_none() {
        log::debug!("no stored credential; answering without QuickBooks data");
    }

    let reply = assistant.respond(&[], text, credential.as_ref()).await;
    if reply.reauthorization_required {
        log::warn!("QuickBooks rejected the stored credential; reconnect to restore invoice data");
    }
    println!("{}", reply.text);
    Ok(())
}
