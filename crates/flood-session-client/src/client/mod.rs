//! Flood session client implementation.

use std::{fmt, sync::Arc};

use flood_session_types::{
    AddOptions, AuthenticatedUser, ClientConfig, FloodError, TorrentSession, TorrentSource,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::hooks::{HookOwner, HookRegistry, HostPattern, InterceptorRegistry};
use crate::payload::{AUTHENTICATE_PATH, AuthenticateRequest, AuthenticateResponse, SubmitRequest};
use crate::response::{Failure, FailureKind, interpret};
use crate::session::{PendingLogin, SessionCookies, SessionState};
use crate::transport::{HttpTransport, ReqwestTransport};


/// FloodClient manages an authenticated session against one Flood instance and submits
/// torrents to it.
///
/// Logging in installs two request hooks scoped to the configured host and to this client's
/// [`HookOwner`]: one attaching the session cookie to outgoing requests, one capturing it from
/// responses. Clients sharing a registry and a host therefore keep separate sessions. Logging
/// out, a failed login, or dropping the client removes them again. Session transitions are
/// serialized per client.
pub struct FloodClient<T: HttpTransport = ReqwestTransport, H: HookRegistry = Arc<InterceptorRegistry>>
{
    config: ClientConfig,
    pattern: HostPattern,
    transport: T,
    hooks: H,
    cookies: SessionCookies,
    state: Mutex<SessionState>,
}

impl FloodClient {
    /// Create a new FloodClient with its own hook registry and a default `reqwest` transport.
    pub fn try_new(config: ClientConfig) -> Result<Self, FloodError> {
        Self::with_registry(config, Arc::new(InterceptorRegistry::default()))
    }

    /// Create a new FloodClient installing its hooks into a registry shared with other clients.
    pub fn with_registry(
        config: ClientConfig,
        registry: Arc<InterceptorRegistry>,
    ) -> Result<Self, FloodError> {
        let transport = ReqwestTransport::new(registry.clone())
            .map_err(|e| FloodError::Other(format!("cannot build HTTP client: {e}")))?;
        let owner = transport.owner();
        Self::with_parts(config, transport, registry, owner)
    }
}

impl<T: HttpTransport, H: HookRegistry> FloodClient<T, H> {
    /// Create a FloodClient from an explicit transport and hook registry.
    ///
    /// The transport is expected to run its requests through the registry tagged with `owner`,
    /// as [`ReqwestTransport`] does with [`InterceptorRegistry`] and
    /// [`ReqwestTransport::owner`].
    pub fn with_parts(
        config: ClientConfig,
        transport: T,
        hooks: H,
        owner: HookOwner,
    ) -> Result<Self, FloodError> {
        let pattern = HostPattern::from_url(config.hostname())
            .ok_or_else(|| {
                FloodError::InvalidConfig(format!("{} has no host", config.hostname()))
            })?
            .owned_by(owner);

        debug!("Created Flood client for {pattern}");
        Ok(Self {
            config,
            pattern,
            transport,
            hooks,
            cookies: SessionCookies::default(),
            state: Mutex::new(SessionState::default()),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a login succeeded and no logout happened since.
    pub async fn is_logged_in(&self) -> bool {
        self.state.lock().await.is_logged_in()
    }

    /// The user reported by the service at login.
    pub async fn current_user(&self) -> Option<AuthenticatedUser> {
        self.state.lock().await.user().cloned()
    }

    /// Number of request hooks this client currently owns: 2 when logged in, 0 otherwise.
    pub async fn installed_hook_count(&self) -> usize {
        self.state.lock().await.hook_count()
    }

    async fn authenticate(&self) -> Result<AuthenticatedUser, FloodError> {
        let url = self.config.endpoint(AUTHENTICATE_PATH)?;
        let body = to_json(&AuthenticateRequest {
            username: self.config.username(),
            password: self.config.password(),
        })?;

        debug!("Authenticating as {} at {url}", self.config.username());
        let response = interpret(self.transport.post_json(&url, &body).await).map_err(
            |failure| match failure.kind {
                FailureKind::NetworkError => FloodError::Transport(failure.message),
                _ => FloodError::Authentication(failure.message),
            },
        )?;

        if response.status != 200 {
            return Err(FloodError::Authentication(format!(
                "unexpected status {} from authenticate",
                response.status
            )));
        }

        let reply: AuthenticateResponse = response.json().map_err(|e| {
            FloodError::Authentication(format!("malformed authenticate response: {e}"))
        })?;
        if !reply.success {
            return Err(FloodError::Authentication(
                reply.message.unwrap_or_else(|| "login rejected".into()),
            ));
        }

        Ok(AuthenticatedUser {
            username: reply
                .username
                .unwrap_or_else(|| self.config.username().to_owned()),
            level: reply.level.unwrap_or_default(),
        })
    }
}

impl<T: HttpTransport, H: HookRegistry> TorrentSession for FloodClient<T, H> {
    async fn log_in(&self) -> Result<(), FloodError> {
        let mut state = self.state.lock().await;
        if state.is_logged_in() {
            debug!("Already logged in to {}", self.pattern);
            return Ok(());
        }

        // Hooks go in before the request so the response's cookie is captured.
        let attempt = PendingLogin::begin(&self.hooks, &self.pattern, &self.cookies);
        match self.authenticate().await {
            Ok(user) => {
                info!(
                    "Logged in to {} as {} (level {})",
                    self.pattern, user.username, user.level
                );
                attempt.commit(&mut state, user);
                Ok(())
            }
            Err(e) => {
                warn!("Login to {} failed: {e}", self.pattern);
                drop(attempt);
                Err(e)
            }
        }
    }

    async fn log_out(&self) {
        let mut state = self.state.lock().await;
        if state.reset(&self.hooks, &self.cookies) {
            info!("Logged out of {}", self.pattern);
        } else {
            debug!("Not logged in to {}, nothing to log out of", self.pattern);
        }
    }

    async fn add(&self, source: TorrentSource, options: AddOptions) -> Result<(), FloodError> {
        debug!("Adding torrent {source:?} with {options:?}");
        let request = SubmitRequest::new(source, options);
        let url = self.config.endpoint(request.path())?;
        let body = to_json(&request)?;

        interpret(self.transport.post_json(&url, &body).await).map_err(map_submit_failure)?;

        info!("Torrent submitted to {url}");
        Ok(())
    }
}

impl<T: HttpTransport, H: HookRegistry> Drop for FloodClient<T, H> {
    fn drop(&mut self) {
        if self.state.get_mut().reset(&self.hooks, &self.cookies) {
            debug!("Released session hooks for {} on drop", self.pattern);
        }
    }
}

impl<T: HttpTransport, H: HookRegistry> fmt::Debug for FloodClient<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloodClient")
            .field("config", &self.config)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Maps an add-files / add-urls failure to the client error.
fn map_submit_failure(failure: Failure) -> FloodError {
    match (failure.kind, failure.status) {
        (FailureKind::NetworkError, _) | (_, None) => FloodError::Transport(failure.message),
        (_, Some(status)) => {
            warn!("Torrent submission rejected with {status}: {}", failure.message);
            FloodError::Submission {
                status,
                message: failure.message,
            }
        }
    }
}

fn to_json<B: Serialize>(body: &B) -> Result<Value, FloodError> {
    serde_json::to_value(body).map_err(|e| FloodError::Other(format!("cannot encode body: {e}")))
}
