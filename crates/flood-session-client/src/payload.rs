//! Request bodies for the Flood API.

use base64::{Engine, engine::general_purpose::STANDARD};
use flood_session_types::{AddOptions, TorrentSource};
use serde::{Deserialize, Serialize};

/// `POST` target for [`AuthenticateRequest`].
pub(crate) const AUTHENTICATE_PATH: &str = "api/auth/authenticate";
/// `POST` target for file submissions.
pub(crate) const ADD_FILES_PATH: &str = "api/torrents/add-files";
/// `POST` target for URL submissions.
pub(crate) const ADD_URLS_PATH: &str = "api/torrents/add-urls";

#[derive(Debug, Serialize)]
pub(crate) struct AuthenticateRequest<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

/// Body of a `200` authenticate response.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthenticateResponse {
    #[serde(default)]
    pub(crate) success: bool,
    pub(crate) username: Option<String>,
    pub(crate) level: Option<u32>,
    pub(crate) message: Option<String>,
}

/// The torrents being submitted. Serializes as either a `files` or a `urls` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum Torrents {
    /// Base64-encoded `.torrent` files.
    #[serde(rename = "files")]
    Files(Vec<String>),
    /// Torrent or magnet URLs.
    #[serde(rename = "urls")]
    Urls(Vec<String>),
}

/// Body of an add-files / add-urls request.
///
/// `destination` and `tags` are always present on the wire, empty when not set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SubmitRequest {
    #[serde(flatten)]
    pub(crate) torrents: Torrents,
    pub(crate) destination: String,
    pub(crate) tags: Vec<String>,
    pub(crate) start: bool,
}

impl SubmitRequest {
    pub(crate) fn new(source: TorrentSource, options: AddOptions) -> Self {
        let torrents = match source {
            TorrentSource::File(bytes) => Torrents::Files(vec![STANDARD.encode(bytes)]),
            TorrentSource::Url(url) => Torrents::Urls(vec![url]),
        };

        Self {
            torrents,
            destination: options.path.unwrap_or_default(),
            tags: options.label.filter(|l| !l.is_empty()).into_iter().collect(),
            start: !options.paused.unwrap_or(false),
        }
    }

    /// API path this request is posted to.
    pub(crate) fn path(&self) -> &'static str {
        match self.torrents {
            Torrents::Files(_) => ADD_FILES_PATH,
            Torrents::Urls(_) => ADD_URLS_PATH,
        }
    }
}
