//! # Flood session CLI
//!
//! ## Usage
//!
//! ```sh,ignore
//! export FLOOD_HOST=https://flood.example.com FLOOD_USERNAME=me FLOOD_PASSWORD=secret
//! cargo run --release --bin flood-session -- add-url https://example.com/test.torrent --paused
//! ```

mod cli;

use clap::Parser;
use flood_session_client::FloodClient;
use flood_session_types::{AddOptions, FloodError, TorrentSession, TorrentSource};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

/// Initializes the tracing subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Logs in, submits `source`, and always logs out again.
async fn submit(
    client: &FloodClient,
    source: TorrentSource,
    options: AddOptions,
) -> Result<(), FloodError> {
    client.log_in().await?;
    let result = client.add(source, options).await;
    client.log_out().await;
    result
}

async fn run(client: &FloodClient, command: Command) -> Result<(), FloodError> {
    match command {
        Command::Login => {
            client.log_in().await?;
            if let Some(user) = client.current_user().await {
                info!("Credentials accepted for {} (level {})", user.username, user.level);
            }
            client.log_out().await;
        }
        Command::AddFile { path, options } => {
            let source = TorrentSource::from_path(&path)?;
            submit(client, source, options.into()).await?;
            info!("Added {}", path.display());
        }
        Command::AddUrl { url, options } => {
            submit(client, TorrentSource::Url(url.clone()), options.into()).await?;
            info!("Added {url}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = cli.connection.into_config()?;
    let client = FloodClient::try_new(config)?;
    info!("Using {:?}", client.config());

    if let Err(e) = run(&client, cli.command).await {
        error!("{e}");
        return Err(e.into());
    }

    Ok(())
}
