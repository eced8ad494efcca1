use std::{env, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use flood_session_types::{
    AddOptions, ClientConfig, FloodError, HOST_VAR, PASSWORD_VAR, USERNAME_VAR,
};

/// Top-level CLI struct for the binary.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Flood connection settings
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and as whom to connect. Unset flags fall back to the environment.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct ConnectionArgs {
    /// Flood base URL [env: FLOOD_HOST]
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Flood username [env: FLOOD_USERNAME]
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Flood password [env: FLOOD_PASSWORD]
    #[arg(short, long, global = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Builds the client configuration, reading missing values from the environment.
    pub(crate) fn into_config(self) -> Result<ClientConfig, FloodError> {
        self.resolve(|key| env::var(key).ok())
    }

    fn resolve<F: Fn(&str) -> Option<String>>(self, lookup: F) -> Result<ClientConfig, FloodError> {
        let host = self.host.or_else(|| lookup(HOST_VAR)).ok_or_else(|| {
            FloodError::InvalidConfig(format!("no host given: pass --host or set {HOST_VAR}"))
        })?;

        ClientConfig::try_new(
            self.username
                .or_else(|| lookup(USERNAME_VAR))
                .unwrap_or_default(),
            self.password
                .or_else(|| lookup(PASSWORD_VAR))
                .unwrap_or_default(),
            &host,
        )
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Check that the credentials are accepted.
    Login,

    /// Add a torrent from a local .torrent file.
    AddFile {
        /// Path to the .torrent file
        path: PathBuf,

        #[command(flatten)]
        options: CliAddOptions,
    },

    /// Add a torrent from a URL or magnet link.
    AddUrl {
        /// URL of the torrent
        url: String,

        #[command(flatten)]
        options: CliAddOptions,
    },
}

/// CLI representation of the add options.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct CliAddOptions {
    /// Add the torrent without starting it.
    #[arg(long, default_value_t = false)]
    pub paused: bool,

    /// Destination directory on the server.
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Label (tag) for the torrent.
    #[arg(short, long)]
    pub label: Option<String>,
}

impl From<CliAddOptions> for AddOptions {
    fn from(cli: CliAddOptions) -> Self {
        Self {
            paused: Some(cli.paused),
            path: cli.destination,
            label: cli.label,
        }
    }
}
