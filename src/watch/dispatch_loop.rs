//! The single background loop that turns session events into notifications.
//!
//! ```text
//! EventSource ──next_event()──► translate() ──► registry.snapshot() ──► watcher.notify()
//!      ▲                                                                (sequential)
//!      └── stop() on shutdown signal
//! ```
//!
//! Delivery is synchronous: every route is handed to every watcher of its
//! snapshot before the next route or event is looked at.

use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;

use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::translate;
use super::WatcherRegistry;
use crate::metrics::EVENTS_RECEIVED;
use crate::metrics::ROUTES_DELIVERED;
use crate::metrics::WATCHER_PANICS;
use crate::EventSource;
use crate::ReachableRoute;
use crate::SessionEvent;

/// Lifecycle of one dispatch loop instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Consuming events
    Running,
    /// Stop requested, no further events are consumed
    Draining,
    /// Terminal, the loop has exited
    Stopped,
}

enum Step {
    Shutdown,
    Event(SessionEvent),
    SourceClosed,
}

pub struct DispatchLoop {
    name: String,
    events: Box<dyn EventSource>,
    registry: WatcherRegistry,
    shutdown_signal: watch::Receiver<()>,
    state_tx: watch::Sender<LoopState>,
}

impl DispatchLoop {
    pub fn new(
        name: impl Into<String>,
        events: Box<dyn EventSource>,
        registry: WatcherRegistry,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Running);
        Self {
            name: name.into(),
            events,
            registry,
            shutdown_signal,
            state_tx,
        }
    }

    /// Subscribes to state transitions of this loop.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    /// Runs until the shutdown signal fires or the event source closes.
    ///
    /// Consumes the loop, so it can reach [`LoopState::Stopped`] only once.
    pub async fn run(mut self) {
        debug!(notifier = %self.name, "Dispatch loop started");

        loop {
            let step = tokio::select! {
                biased;
                // An error means the sender is gone, which is a stop request as well.
                _ = self.shutdown_signal.changed() => Step::Shutdown,
                event = self.events.next_event() => match event {
                    Some(event) => Step::Event(event),
                    None => Step::SourceClosed,
                },
            };

            match step {
                Step::Event(event) => self.dispatch(event),
                Step::Shutdown => {
                    debug!(notifier = %self.name, "Dispatch loop received shutdown signal");
                    break;
                }
                Step::SourceClosed => {
                    warn!(notifier = %self.name, "Best path event stream closed unexpectedly");
                    break;
                }
            }
        }

        self.state_tx.send_replace(LoopState::Draining);
        self.events.stop();
        self.state_tx.send_replace(LoopState::Stopped);

        info!(notifier = %self.name, "Dispatch loop stopped");
    }

    fn dispatch(
        &self,
        event: SessionEvent,
    ) {
        EVENTS_RECEIVED.with_label_values(&[event.kind()]).inc();

        for route in translate(&event) {
            let snapshot = self.registry.snapshot();
            trace!(notifier = %self.name, %route, watchers = snapshot.len(), "Dispatching route");

            for entry in snapshot.values() {
                deliver(&self.name, entry.identity(), route.clone(), |r| entry.notify(r));
            }
        }
    }
}

/// Hands `route` to one watcher. A panicking watcher is logged and skipped.
fn deliver(
    name: &str,
    identity: &str,
    route: ReachableRoute,
    notify: impl FnOnce(ReachableRoute),
) {
    match catch_unwind(AssertUnwindSafe(|| notify(route))) {
        Ok(()) => ROUTES_DELIVERED.inc(),
        Err(_) => {
            WATCHER_PANICS.inc();
            error!(notifier = name, watcher = identity, "Watcher panicked while being notified");
        }
    }
}
