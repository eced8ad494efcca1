//! # Session client for the Flood torrent web UI.
//!
//! usage:
//!
//! ```rust,ignore
//! use flood_session_client::FloodClient;
//! use flood_session_types::{AddOptions, ClientConfig, TorrentSession, TorrentSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::try_new("user", "password", "https://flood.example.com/")?;
//!     let client = FloodClient::try_new(config)?;
//!     client.log_in().await?;
//!     client
//!         .add(
//!             TorrentSource::from_path("path/to/file.torrent")?,
//!             AddOptions { label: Some("linux".into()), ..Default::default() },
//!         )
//!         .await?;
//!     client.log_out().await;
//!     Ok(())
//! }
//! ```
//!

#[cfg(test)]
use {axum as _, tracing_subscriber as _};

mod client;
mod hooks;
mod payload;
mod response;
mod session;
mod transport;

#[cfg(test)]
mod testutil;

pub use client::FloodClient;
pub use hooks::{
    HookHandle, HookOwner, HookRegistry, HostPattern, IncomingObserver, InterceptorRegistry,
    OutgoingMutator,
};
pub use response::{Failure, FailureKind, interpret};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};
