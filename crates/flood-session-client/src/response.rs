//! Classification of HTTP outcomes into success or a typed failure.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::transport::{HttpResponse, TransportError};

/// Why a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401 or 403.
    Unauthorized,
    /// Any other 4xx.
    BadRequest,
    /// 5xx, or any other non-2xx status.
    ServerError,
    /// No response was received.
    NetworkError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad request",
            Self::ServerError => "server error",
            Self::NetworkError => "network error",
        })
    }
}

/// A classified failure, with the message the service gave when it gave one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Failure {
    /// Failure category.
    pub kind: FailureKind,
    /// HTTP status, absent for [`FailureKind::NetworkError`].
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Maps a transport outcome to the 2xx response, or to a [`Failure`].
pub fn interpret(result: Result<HttpResponse, TransportError>) -> Result<HttpResponse, Failure> {
    let response = result.map_err(|e| Failure {
        kind: FailureKind::NetworkError,
        status: None,
        message: e.0,
    })?;

    if response.is_success() {
        return Ok(response);
    }

    let kind = match response.status {
        401 | 403 => FailureKind::Unauthorized,
        400..=499 => FailureKind::BadRequest,
        _ => FailureKind::ServerError,
    };

    Err(Failure {
        kind,
        status: Some(response.status),
        message: failure_message(&response),
    })
}

/// Picks the most specific description available for a failed response.
pub(crate) fn failure_message(response: &HttpResponse) -> String {
    if let Ok(ErrorBody {
        message: Some(message),
    }) = response.json::<ErrorBody>()
    {
        if !message.trim().is_empty() {
            return message;
        }
    }

    let text = response.text();
    let text = text.trim();
    if !text.is_empty() && !text.starts_with('{') {
        return text.to_owned();
    }

    reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("request failed with status {}", response.status))
}
