//! Ledgerchat HTTP server binary.
//!
//! Prints `{"port": N}` to stdout once bound so a parent process can discover
//! the port.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ledgerchat_api::{AppState, config::ApiConfig};
use ledgerchat_core::Assistant;
use ledgerchat_core::credential::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,ledgerchat_api=debug,ledgerchat_core=debug";

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "ledgerchat_server", about = "Ledgerchat HTTP server")]
struct Args {
    /// Address to listen on (port 0 = ephemeral).
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind: String,

    /// Persist the QuickBooks credential to this JSON file.
    ///
    /// Without it the credential lives in memory and is lost on restart.
    #[arg(long, env = "LEDGERCHAT_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Write logs to stderr so stdout is reserved for the JSON port message.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let store: Arc<dyn CredentialStore> = match &args.credentials_file {
        Some(path) => {
            info!(path = %path.display(), "using file credential store");
            Arc::new(FileCredentialStore::new(path))
        }
        None => {
            info!("using in-memory credential store");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let config = ApiConfig {
        bind_addr: args.bind,
        ..ApiConfig::from_env()
    };
    if config.ledger.quickbooks.client_id.is_none() {
        tracing::warn!("QUICKBOOKS_CLIENT_ID is not set; authorization will fail");
    }
    if config.ledger.ai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; chat will return fallback replies");
    }

    let assistant = Arc::new(Assistant::new(&config.ledger, store)?);
    let _cleanup = assistant.authorization_states().spawn_cleanup_task();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = ledgerchat_api::router(AppState { assistant });

    println!("{}", serde_json::json!({ "port": local_addr.port() }));
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
