//! HTTP transport seam.
//!
//! This module provides the [`HttpTransport`] trait which abstracts the network layer, enabling
//! mocking in tests, and [`ReqwestTransport`], the implementation used in production.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::hooks::{HookOwner, InterceptorRegistry};

/// The request never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A response as seen by the client: status and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response from a status and a JSON value.
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Builds a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends JSON `POST` requests.
#[cfg_attr(test, mockall::automock)]
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    /// POST `body` as `application/json` to `url`.
    async fn post_json(&self, url: &Url, body: &Value) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] over `reqwest`, running every exchange through an [`InterceptorRegistry`].
///
/// Each transport has its own [`HookOwner`], so only hooks installed for that owner (or for
/// no owner at all) see its exchanges.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    interceptors: Arc<InterceptorRegistry>,
    owner: HookOwner,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    pub fn new(interceptors: Arc<InterceptorRegistry>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self::with_client(client, interceptors))
    }

    /// Creates a transport around a preconfigured `reqwest` client (timeouts, proxies, ...).
    pub fn with_client(client: reqwest::Client, interceptors: Arc<InterceptorRegistry>) -> Self {
        Self {
            client,
            interceptors,
            owner: HookOwner::unique(),
        }
    }

    /// The owner this transport's exchanges are tagged with.
    pub fn owner(&self) -> HookOwner {
        self.owner
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<HttpResponse, TransportError> {
        let mut headers = HeaderMap::new();
        self.interceptors
            .apply_outgoing(self.owner, url, &mut headers);

        debug!("POST {url}");
        let response = self
            .client
            .post(url.clone())
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        // After redirects the response may come from another origin.
        self.interceptors
            .observe_incoming(self.owner, response.url(), response.headers());

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();
        debug!("POST {url} -> {status} ({} bytes)", body.len());

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn response_helpers() {
        let response = HttpResponse::json_body(401, &json!({ "message": "Failed login." }));
        assert!(!response.is_success());
        let value: Value = response.json().unwrap();
        assert_eq!(value["message"], "Failed login.");

        let response = HttpResponse::empty(204);
        assert!(response.is_success());
        assert_eq!(response.text(), "");
    }

    #[test]
    fn transports_get_distinct_owners() {
        let registry = Arc::new(InterceptorRegistry::default());
        let first = ReqwestTransport::new(registry.clone()).unwrap();
        let second = ReqwestTransport::new(registry).unwrap();
        assert_ne!(first.owner(), second.owner());
        assert_eq!(first.clone().owner(), first.owner());
    }
}
