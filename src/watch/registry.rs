//! Watcher registry with lock-free snapshots
//!
//! The map of watchers is immutable once published. Writers build a new map
//! and swap it in, so the dispatch loop iterates a point-in-time copy that
//! concurrent `register`/`unregister` calls can never disturb.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use tracing::trace;

use crate::metrics::REGISTERED_WATCHERS;
use crate::ReachableRoute;

/// Receiver of route notifications
///
/// Called from the dispatch loop, one route at a time. A slow implementation
/// delays every watcher and event after it.
pub trait RouteWatcher: Send + Sync + 'static {
    fn notify(
        &self,
        route: ReachableRoute,
    );
}

impl<F> RouteWatcher for F
where
    F: Fn(ReachableRoute) + Send + Sync + 'static,
{
    fn notify(
        &self,
        route: ReachableRoute,
    ) {
        self(route)
    }
}

/// A registered watcher as seen by one delivery pass
#[derive(Clone)]
pub struct WatcherEntry {
    identity: Arc<str>,
    registration_id: u64,
    watcher: Arc<dyn RouteWatcher>,
}

impl WatcherEntry {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn notify(
        &self,
        route: ReachableRoute,
    ) {
        self.watcher.notify(route)
    }
}

impl fmt::Debug for WatcherEntry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatcherEntry")
            .field("identity", &self.identity)
            .field("registration_id", &self.registration_id)
            .finish_non_exhaustive()
    }
}

type WatcherMap = HashMap<Arc<str>, WatcherEntry>;

/// Point-in-time copy of the registered watchers
pub type WatcherSnapshot = Arc<WatcherMap>;

#[derive(Debug)]
struct RegistryInner {
    watchers: ArcSwap<WatcherMap>,
    /// Next registration id (monotonically increasing)
    next_id: AtomicU64,
}

impl RegistryInner {
    /// Removes `identity` if `matches` accepts the current entry. Returns whether
    /// anything was removed.
    fn remove_if(
        &self,
        identity: &str,
        matches: impl Fn(&WatcherEntry) -> bool,
    ) -> bool {
        let previous = self.watchers.rcu(|current| {
            match current.get(identity) {
                Some(entry) if matches(entry) => {
                    let mut next = WatcherMap::clone(current);
                    next.remove(identity);
                    Arc::new(next)
                }
                _ => Arc::clone(current),
            }
        });

        let removed = previous.get(identity).is_some_and(&matches);
        if removed {
            REGISTERED_WATCHERS.dec();
        }
        removed
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let remaining = self.watchers.load().len();
        if remaining > 0 {
            REGISTERED_WATCHERS.sub(remaining as i64);
        }
    }
}

/// Concurrency-safe mapping from watcher identity to watcher
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone)]
pub struct WatcherRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                watchers: ArcSwap::from_pointee(WatcherMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `watcher` under `identity`.
    ///
    /// Never fails. A watcher already registered under the same identity is
    /// replaced and will not be notified again.
    pub fn register(
        &self,
        identity: impl Into<String>,
        watcher: impl RouteWatcher,
    ) -> RegistrationHandle {
        self.register_arc(identity, Arc::new(watcher))
    }

    /// Same as [`WatcherRegistry::register`] for an already shared watcher.
    pub fn register_arc(
        &self,
        identity: impl Into<String>,
        watcher: Arc<dyn RouteWatcher>,
    ) -> RegistrationHandle {
        let identity: Arc<str> = Arc::from(identity.into());
        let registration_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = WatcherEntry {
            identity: Arc::clone(&identity),
            registration_id,
            watcher,
        };

        let previous = self.inner.watchers.rcu(|current| {
            let mut next = WatcherMap::clone(current);
            next.insert(Arc::clone(&identity), entry.clone());
            Arc::new(next)
        });

        let replaced = previous.contains_key(&identity);
        if !replaced {
            REGISTERED_WATCHERS.inc();
        }
        info!(watcher = %identity, registration_id, replaced, "Watcher registered");

        RegistrationHandle {
            identity,
            registration_id,
            registry: Arc::clone(&self.inner),
            closed: AtomicBool::new(false),
        }
    }

    /// Removes whatever watcher is registered under `identity`. No-op when absent.
    pub fn unregister(
        &self,
        identity: &str,
    ) -> bool {
        let removed = self.inner.remove_if(identity, |_| true);
        if removed {
            info!(watcher = identity, "Watcher unregistered");
        }
        removed
    }

    /// Returns an independent, immutable copy of the current watchers.
    ///
    /// Iteration order is unspecified.
    pub fn snapshot(&self) -> WatcherSnapshot {
        self.inner.watchers.load_full()
    }

    pub fn contains(
        &self,
        identity: &str,
    ) -> bool {
        self.inner.watchers.load().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.inner.watchers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.watchers.load().is_empty()
    }

    /// Identities of the currently registered watchers, in no particular order
    pub fn identities(&self) -> Vec<String> {
        self.inner
            .watchers
            .load()
            .keys()
            .map(|k| k.to_string())
            .collect()
    }
}

/// Returned by a registration; closing it stops further notifications.
///
/// Dropping the handle does not unregister the watcher.
pub struct RegistrationHandle {
    identity: Arc<str>,
    registration_id: u64,
    registry: Arc<RegistryInner>,
    closed: AtomicBool,
}

impl RegistrationHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Removes the watcher this handle was returned for.
    ///
    /// Idempotent. If the identity has since been taken over by a newer
    /// registration, that registration is left alone. Returns `true` only for
    /// the call that actually removed the watcher.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            trace!(watcher = %self.identity, "Registration already closed");
            return false;
        }

        let registration_id = self.registration_id;
        let removed = self
            .registry
            .remove_if(&self.identity, |entry| entry.registration_id == registration_id);
        info!(watcher = %self.identity, registration_id, removed, "Registration closed");
        removed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("identity", &self.identity)
            .field("registration_id", &self.registration_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
