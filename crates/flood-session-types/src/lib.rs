//! # Flood Session Types
//!
//! This crate defines the configuration, option and error types shared by the Flood session
//! client, together with the [`TorrentSession`] contract it implements.

use std::{env, fmt, fs, path::Path};

use thiserror::Error;
use url::Url;

/// Environment variable holding the Flood base URL.
pub const HOST_VAR: &str = "FLOOD_HOST";
/// Environment variable holding the Flood username.
pub const USERNAME_VAR: &str = "FLOOD_USERNAME";
/// Environment variable holding the Flood password.
pub const PASSWORD_VAR: &str = "FLOOD_PASSWORD";

/// Error type for Flood session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FloodError {
    /// The service rejected the login, or answered it with something other than a success.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The service rejected an add-by-file or add-by-URL request.
    #[error("submission rejected with status {status}: {message}")]
    Submission {
        /// HTTP status returned by the service.
        status: u16,
        /// Message from the response body, or a generic description.
        message: String,
    },

    /// No response reached us (DNS, connection, timeout, ...).
    #[error("network error: {0}")]
    Transport(String),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File system errors (file not found, permission denied, etc.)
    #[error("file system error: {0}")]
    FileSystem(String),

    /// Other unexpected errors
    #[error("unexpected error: {0}")]
    Other(String),
}

impl FloodError {
    /// Returns the human-readable message carried by the error.
    pub fn message(&self) -> &str {
        match self {
            Self::Authentication(msg)
            | Self::Transport(msg)
            | Self::InvalidConfig(msg)
            | Self::FileSystem(msg)
            | Self::Other(msg) => msg,
            Self::Submission { message, .. } => message,
        }
    }
}

/// Connection settings for a single Flood instance.
///
/// Immutable once built: a client owns one for its whole lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    username: String,
    password: String,
    hostname: Url,
}

impl ClientConfig {
    /// Builds a configuration, validating `hostname`.
    ///
    /// The hostname must be an absolute `http` or `https` URL. It is normalized to end with a `/`
    /// so that API paths resolve below it even when Flood is served from a sub-path.
    pub fn try_new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: &str,
    ) -> Result<Self, FloodError> {
        let mut url = Url::parse(hostname.trim())
            .map_err(|e| FloodError::InvalidConfig(format!("invalid hostname {hostname:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(FloodError::InvalidConfig(format!(
                "hostname must be an http(s) URL, got {hostname:?}"
            )));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self {
            username: username.into(),
            password: password.into(),
            hostname: url,
        })
    }

    /// Reads the configuration from `FLOOD_HOST`, `FLOOD_USERNAME` and `FLOOD_PASSWORD`.
    pub fn from_env() -> Result<Self, FloodError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, FloodError> {
        let hostname = lookup(HOST_VAR)
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| FloodError::InvalidConfig(format!("{HOST_VAR} is not set")))?;

        Self::try_new(
            lookup(USERNAME_VAR).unwrap_or_default(),
            lookup(PASSWORD_VAR).unwrap_or_default(),
            &hostname,
        )
    }

    /// The configured username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The configured password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The normalized base URL of the service.
    pub fn hostname(&self) -> &Url {
        &self.hostname
    }

    /// Resolves an API path (without leading slash) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, FloodError> {
        self.hostname
            .join(path.trim_start_matches('/'))
            .map_err(|e| FloodError::InvalidConfig(format!("cannot resolve {path:?}: {e}")))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print credentials.
        write!(
            f,
            "Flood(hostname=\"{}\", username=\"{}\", password=<{}>)",
            self.hostname,
            self.username,
            if self.password.is_empty() {
                "unset"
            } else {
                "set"
            },
        )
    }
}

/// User-supplied overrides for a submitted torrent. Absent fields mean "service default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Add the torrent without starting it.
    pub paused: Option<bool>,
    /// Destination directory on the server.
    pub path: Option<String>,
    /// Label to tag the torrent with.
    pub label: Option<String>,
}

/// Where a torrent to add comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Raw `.torrent` file content.
    File(Vec<u8>),
    /// A remote URL (http(s) `.torrent` link or magnet URI).
    Url(String),
}

impl TorrentSource {
    /// Reads a `.torrent` file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FloodError> {
        let path = path.as_ref();
        fs::read(path)
            .map(Self::File)
            .map_err(|e| FloodError::FileSystem(format!("{}: {e}", path.display())))
    }
}

impl fmt::Debug for TorrentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(bytes) => write!(f, "File({} bytes)", bytes.len()),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// Profile returned by the service after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Name the service authenticated us as.
    pub username: String,
    /// Access level reported by the service.
    pub level: u32,
}

/// TorrentSession defines the contract of a client bound to one torrent web UI.
#[allow(async_fn_in_trait)]
pub trait TorrentSession {
    /// Authenticate against the service. Calling it while logged in is a no-op.
    async fn log_in(&self) -> Result<(), FloodError>;
    /// Drop the local session. Never fails, and is a no-op when already logged out.
    async fn log_out(&self);
    /// Submit a torrent. Callers are responsible for having logged in first.
    async fn add(&self, source: TorrentSource, options: AddOptions) -> Result<(), FloodError>;

    /// Submit raw `.torrent` file content.
    async fn add_torrent(&self, file: Vec<u8>, options: AddOptions) -> Result<(), FloodError> {
        self.add(TorrentSource::File(file), options).await
    }

    /// Submit a torrent by URL.
    async fn add_torrent_url(&self, url: &str, options: AddOptions) -> Result<(), FloodError> {
        self.add(TorrentSource::Url(url.to_owned()), options).await
    }
}
