//! Host-scoped request hooks.
//!
//! A hook is a rule that mutates outgoing request headers, or observes incoming response
//! headers, for every exchange whose URL matches a [`HostPattern`]. A pattern scoped to a
//! [`HookOwner`] only applies to exchanges made by that owner, so clients sharing a registry
//! and a host never see each other's session. [`HookRegistry`] is the
//! capability the client is given to install and remove them; [`InterceptorRegistry`] is the
//! in-process implementation consulted by [`crate::ReqwestTransport`].

use std::{
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use reqwest::header::HeaderMap;
use tracing::trace;
use url::Url;

/// Mutates the headers of a request before it is sent.
pub type OutgoingMutator = Box<dyn Fn(&mut HeaderMap) + Send + Sync>;

/// Observes the headers of a response as soon as it arrives.
pub type IncomingObserver = Box<dyn Fn(&HeaderMap) + Send + Sync>;

/// Opaque handle to an installed hook, used to uninstall it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookHandle(u64);

impl HookHandle {
    /// Wraps a registry-specific identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The registry-specific identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Identity a transport tags its exchanges with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookOwner(u64);

impl HookOwner {
    /// An owner distinct from every other one allocated in this process.
    pub fn unique() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Matches URLs that share scheme, host and effective port with a base URL, optionally only
/// for exchanges made by one [`HookOwner`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPattern {
    scheme: String,
    host: String,
    port: Option<u16>,
    owner: Option<HookOwner>,
}

impl HostPattern {
    /// Builds the pattern for `url`'s origin. Returns `None` for URLs without a host.
    pub fn from_url(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_owned(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default(),
            owner: None,
        })
    }

    /// Restricts the pattern to exchanges made by `owner`.
    pub fn owned_by(mut self, owner: HookOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The owner this pattern is restricted to, if any.
    pub fn owner(&self) -> Option<HookOwner> {
        self.owner
    }

    /// Whether `url` belongs to this pattern's origin.
    pub fn matches(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default() == self.port
    }

    /// Whether an exchange with `url` made by `owner` falls under this pattern.
    pub fn applies_to(&self, owner: HookOwner, url: &Url) -> bool {
        self.owner.is_none_or(|o| o == owner) && self.matches(url)
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}/*", self.scheme, self.host, port),
            None => write!(f, "{}://{}/*", self.scheme, self.host),
        }
    }
}

/// Capability to register request hooks with the host platform.
///
/// Registries are typically process-wide and shared between clients, so callers must only ever
/// uninstall handles they installed themselves.
#[cfg_attr(test, mockall::automock)]
pub trait HookRegistry {
    /// Installs a hook run on every request to `pattern` before it is sent.
    fn install_outgoing(&self, pattern: &HostPattern, mutator: OutgoingMutator) -> HookHandle;
    /// Installs a hook run on every response from `pattern`.
    fn install_incoming(&self, pattern: &HostPattern, observer: IncomingObserver) -> HookHandle;
    /// Removes a hook. Returns `false` if the handle was not installed.
    fn uninstall(&self, handle: HookHandle) -> bool;
}

impl<R: HookRegistry + ?Sized> HookRegistry for Arc<R> {
    fn install_outgoing(&self, pattern: &HostPattern, mutator: OutgoingMutator) -> HookHandle {
        (**self).install_outgoing(pattern, mutator)
    }

    fn install_incoming(&self, pattern: &HostPattern, observer: IncomingObserver) -> HookHandle {
        (**self).install_incoming(pattern, observer)
    }

    fn uninstall(&self, handle: HookHandle) -> bool {
        (**self).uninstall(handle)
    }
}

enum Hook {
    Outgoing(OutgoingMutator),
    Incoming(IncomingObserver),
}

struct Rule {
    handle: HookHandle,
    pattern: HostPattern,
    hook: Hook,
}

/// In-memory [`HookRegistry`] applied by [`crate::ReqwestTransport`] around each exchange.
#[derive(Default)]
pub struct InterceptorRegistry {
    next_handle: AtomicU64,
    rules: RwLock<Vec<Rule>>,
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("installed", &self.len())
            .finish()
    }
}

impl InterceptorRegistry {
    /// Number of installed hooks, across all owners.
    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no hook is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every outgoing hook applying to `owner`'s request to `url` over `headers`, in
    /// installation order.
    pub fn apply_outgoing(&self, owner: HookOwner, url: &Url, headers: &mut HeaderMap) {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        for rule in rules.iter().filter(|r| r.pattern.applies_to(owner, url)) {
            if let Hook::Outgoing(mutator) = &rule.hook {
                trace!("applying outgoing hook {:?} to {url}", rule.handle);
                mutator(headers);
            }
        }
    }

    /// Runs every incoming hook applying to `owner`'s response from `url` over its `headers`.
    pub fn observe_incoming(&self, owner: HookOwner, url: &Url, headers: &HeaderMap) {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        for rule in rules.iter().filter(|r| r.pattern.applies_to(owner, url)) {
            if let Hook::Incoming(observer) = &rule.hook {
                trace!("applying incoming hook {:?} to {url}", rule.handle);
                observer(headers);
            }
        }
    }

    fn insert(&self, pattern: &HostPattern, hook: Hook) -> HookHandle {
        let handle = HookHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Rule {
                handle,
                pattern: pattern.clone(),
                hook,
            });
        handle
    }
}

impl HookRegistry for InterceptorRegistry {
    fn install_outgoing(&self, pattern: &HostPattern, mutator: OutgoingMutator) -> HookHandle {
        self.insert(pattern, Hook::Outgoing(mutator))
    }

    fn install_incoming(&self, pattern: &HostPattern, observer: IncomingObserver) -> HookHandle {
        self.insert(pattern, Hook::Incoming(observer))
    }

    fn uninstall(&self, handle: HookHandle) -> bool {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let before = rules.len();
        rules.retain(|r| r.handle != handle);
        rules.len() != before
    }
}
