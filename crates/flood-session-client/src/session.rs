//! Session state: captured cookies, the installed hook pair, and the login state machine.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use flood_session_types::AuthenticatedUser;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use tracing::{debug, warn};

use crate::hooks::{HookHandle, HookRegistry, HostPattern};

/// Cookies captured from the service, shared between the two hooks of one client.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionCookies(Arc<RwLock<BTreeMap<String, String>>>);

impl SessionCookies {
    /// Records every `Set-Cookie` in `headers`. An empty value deletes the cookie.
    pub(crate) fn capture(&self, headers: &HeaderMap) {
        let mut jar = self.0.write().unwrap_or_else(PoisonError::into_inner);
        for value in headers.get_all(SET_COOKIE) {
            let Some((name, value)) = value.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };
            if value.is_empty() {
                jar.remove(name);
            } else {
                jar.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    /// The `Cookie` header to attach, if anything was captured.
    pub(crate) fn header_value(&self) -> Option<HeaderValue> {
        let jar = self.0.read().unwrap_or_else(PoisonError::into_inner);
        if jar.is_empty() {
            return None;
        }
        let cookie = jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&cookie).ok()
    }

    /// Sets the `Cookie` header on `headers`, if anything was captured.
    pub(crate) fn attach(&self, headers: &mut HeaderMap) {
        if let Some(cookie) = self.header_value() {
            headers.insert(COOKIE, cookie);
        }
    }

    pub(crate) fn clear(&self) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Extracts `name` and `value` from a `Set-Cookie` header value.
fn parse_set_cookie(raw: &str) -> Option<(&str, &str)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().trim_matches('"')))
}

/// The outgoing/incoming hook pair. Exists only while both hooks are installed.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct InstalledHooks {
    outgoing: HookHandle,
    incoming: HookHandle,
}

impl InstalledHooks {
    /// Installs the cookie-attaching and cookie-capturing hooks for `pattern`.
    pub(crate) fn install<H: HookRegistry>(
        registry: &H,
        pattern: &HostPattern,
        cookies: &SessionCookies,
    ) -> Self {
        let jar = cookies.clone();
        let outgoing =
            registry.install_outgoing(pattern, Box::new(move |h: &mut HeaderMap| jar.attach(h)));
        let jar = cookies.clone();
        let incoming =
            registry.install_incoming(pattern, Box::new(move |h: &HeaderMap| jar.capture(h)));
        debug!("Installed request hooks {outgoing:?}/{incoming:?} for {pattern}");
        Self { outgoing, incoming }
    }

    /// Removes both hooks.
    pub(crate) fn uninstall<H: HookRegistry>(self, registry: &H) {
        for handle in [self.outgoing, self.incoming] {
            if !registry.uninstall(handle) {
                warn!("Request hook {handle:?} was already gone from the registry");
            }
        }
        debug!(
            "Uninstalled request hooks {:?}/{:?}",
            self.outgoing, self.incoming
        );
    }
}

/// Hooks installed for a login attempt that has not succeeded yet.
///
/// Dropping it without [`PendingLogin::commit`] rolls the attempt back: both hooks are removed
/// and captured cookies are forgotten. This also covers a login future cancelled mid-request.
pub(crate) struct PendingLogin<'a, H: HookRegistry> {
    registry: &'a H,
    cookies: &'a SessionCookies,
    hooks: Option<InstalledHooks>,
}

impl<'a, H: HookRegistry> PendingLogin<'a, H> {
    pub(crate) fn begin(
        registry: &'a H,
        pattern: &HostPattern,
        cookies: &'a SessionCookies,
    ) -> Self {
        Self {
            registry,
            cookies,
            hooks: Some(InstalledHooks::install(registry, pattern, cookies)),
        }
    }

    /// Hands the hooks over to `state`, marking it logged in.
    pub(crate) fn commit(mut self, state: &mut SessionState, user: AuthenticatedUser) {
        if let Some(hooks) = self.hooks.take() {
            state.confirm(self.registry, hooks, user);
        }
    }
}

impl<H: HookRegistry> Drop for PendingLogin<'_, H> {
    fn drop(&mut self) {
        if let Some(hooks) = self.hooks.take() {
            debug!("Rolling back request hooks of a failed login");
            hooks.uninstall(self.registry);
            self.cookies.clear();
        }
    }
}

/// Login state of one client.
#[derive(Debug, Default)]
pub(crate) enum SessionState {
    /// No hooks installed.
    #[default]
    LoggedOut,
    /// Authenticated, both hooks installed.
    LoggedIn {
        hooks: InstalledHooks,
        user: AuthenticatedUser,
    },
}

impl SessionState {
    pub(crate) fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn { .. })
    }

    pub(crate) fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Self::LoggedIn { user, .. } => Some(user),
            Self::LoggedOut => None,
        }
    }

    pub(crate) fn hook_count(&self) -> usize {
        if self.is_logged_in() { 2 } else { 0 }
    }

    /// Logged out -> logged in, adopting hooks installed for the login attempt.
    ///
    /// If a session was somehow still active its hooks are released first so that no pair is
    /// ever leaked.
    pub(crate) fn confirm<H: HookRegistry>(
        &mut self,
        registry: &H,
        hooks: InstalledHooks,
        user: AuthenticatedUser,
    ) {
        if let Self::LoggedIn { hooks: stale, .. } = std::mem::take(self) {
            stale.uninstall(registry);
        }
        *self = Self::LoggedIn { hooks, user };
    }

    /// Any state -> logged out, releasing the hooks and forgetting captured cookies.
    /// Returns whether a session was active.
    pub(crate) fn reset<H: HookRegistry>(
        &mut self,
        registry: &H,
        cookies: &SessionCookies,
    ) -> bool {
        cookies.clear();
        match std::mem::take(self) {
            Self::LoggedIn { hooks, .. } => {
                hooks.uninstall(registry);
                true
            }
            Self::LoggedOut => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::hooks::{HookOwner, InterceptorRegistry};

    fn set_cookie_headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for v in values {
            headers.append(SET_COOKIE, HeaderValue::from_static(v));
        }
        headers
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            username: "testuser".into(),
            level: 10,
        }
    }

    #[test]
    fn parses_set_cookie_pairs() {
        assert_eq!(
            parse_set_cookie("jwt=abc.def; Path=/; HttpOnly"),
            Some(("jwt", "abc.def"))
        );
        assert_eq!(parse_set_cookie("jwt=\"quoted\""), Some(("jwt", "quoted")));
        assert_eq!(parse_set_cookie("jwt=; Max-Age=0"), Some(("jwt", "")));
        assert_eq!(parse_set_cookie("no-equals-sign"), None);
        assert_eq!(parse_set_cookie("=orphan"), None);
    }

    #[test]
    fn cookies_capture_attach_and_clear() {
        let cookies = SessionCookies::default();
        assert!(cookies.header_value().is_none());

        cookies.capture(&set_cookie_headers(&["jwt=token; Path=/", "lang=en"]));
        let mut headers = HeaderMap::new();
        cookies.attach(&mut headers);
        assert_eq!(headers.get(COOKIE).unwrap(), "jwt=token; lang=en");

        cookies.capture(&set_cookie_headers(&["lang=; Max-Age=0"]));
        assert_eq!(cookies.header_value().unwrap(), "jwt=token");

        cookies.clear();
        let mut headers = HeaderMap::new();
        cookies.attach(&mut headers);
        assert!(headers.get(COOKIE).is_none());
    }

    #[test]
    fn installed_hooks_round_trip_cookies_through_registry() {
        let registry = InterceptorRegistry::default();
        let base = Url::parse("https://example.com:1234/").unwrap();
        let owner = HookOwner::unique();
        let pattern = HostPattern::from_url(&base).unwrap().owned_by(owner);
        let cookies = SessionCookies::default();

        let hooks = InstalledHooks::install(&registry, &pattern, &cookies);
        assert_eq!(registry.len(), 2);

        let endpoint = base.join("api/auth/authenticate").unwrap();
        let login_response = set_cookie_headers(&["jwt=token; HttpOnly"]);
        registry.observe_incoming(owner, &endpoint, &login_response);
        let mut headers = HeaderMap::new();
        registry.apply_outgoing(owner, &endpoint, &mut headers);
        assert_eq!(headers.get(COOKIE).unwrap(), "jwt=token");

        let stranger = HookOwner::unique();
        registry.observe_incoming(stranger, &endpoint, &set_cookie_headers(&["jwt=other"]));
        let mut headers = HeaderMap::new();
        registry.apply_outgoing(stranger, &endpoint, &mut headers);
        assert!(headers.get(COOKIE).is_none());
        assert_eq!(cookies.header_value().unwrap(), "jwt=token");

        hooks.uninstall(&registry);
        assert!(registry.is_empty());
    }

    #[test]
    fn state_transitions() {
        let registry = InterceptorRegistry::default();
        let pattern = HostPattern::from_url(&Url::parse("https://example.com/").unwrap()).unwrap();
        let cookies = SessionCookies::default();
        let mut state = SessionState::default();
        assert!(!state.is_logged_in());
        assert_eq!(state.hook_count(), 0);

        let hooks = InstalledHooks::install(&registry, &pattern, &cookies);
        state.confirm(&registry, hooks, user());
        assert!(state.is_logged_in());
        assert_eq!(state.user(), Some(&user()));
        assert_eq!(state.hook_count(), 2);
        assert_eq!(registry.len(), 2);

        assert!(state.reset(&registry, &cookies));
        assert!(!state.is_logged_in());
        assert!(registry.is_empty());

        assert!(!state.reset(&registry, &cookies));
        assert!(registry.is_empty());
    }

    #[test]
    fn pending_login_rolls_back_unless_committed() {
        let registry = InterceptorRegistry::default();
        let pattern = HostPattern::from_url(&Url::parse("https://example.com/").unwrap()).unwrap();
        let cookies = SessionCookies::default();
        let mut state = SessionState::default();

        {
            let _attempt = PendingLogin::begin(&registry, &pattern, &cookies);
            cookies.capture(&set_cookie_headers(&["jwt=half-done"]));
            assert_eq!(registry.len(), 2);
        }
        assert!(registry.is_empty());
        assert!(cookies.header_value().is_none());

        PendingLogin::begin(&registry, &pattern, &cookies).commit(&mut state, user());
        assert_eq!(registry.len(), 2);
        assert!(state.is_logged_in());
    }

    #[test]
    fn confirm_releases_a_stale_pair() {
        let registry = InterceptorRegistry::default();
        let pattern = HostPattern::from_url(&Url::parse("https://example.com/").unwrap()).unwrap();
        let cookies = SessionCookies::default();
        let mut state = SessionState::default();

        let first = InstalledHooks::install(&registry, &pattern, &cookies);
        state.confirm(&registry, first, user());
        let second = InstalledHooks::install(&registry, &pattern, &cookies);
        state.confirm(&registry, second, user());

        assert_eq!(registry.len(), 2);
    }
}
