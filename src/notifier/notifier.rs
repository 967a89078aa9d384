//! Lifecycle controller tying a routing session to the watch machinery.
//!
//! ## Key Responsibilities
//! - Starts the session and adds the statically configured peers
//! - Launches the [`DispatchLoop`] on the best-path subscription
//! - On stop, drains the loop before tearing the session down
//! - Accepts watcher registrations at any time, before or after `start()`
//!
//! ## Example Usage
//! ```rust,no_run
//! # use bgp_watch::*;
//! # async fn run() -> Result<()> {
//! let config = NotifierConfig::new()?
//!     .with_session(SessionConfig::new(65001, "172.18.0.2"))
//!     .with_peer(PeerConfig::new(65000, "127.0.0.1".parse().unwrap()));
//! let notifier = RouteNotifier::new(config, LoopbackSession::new());
//!
//! let registration = notifier.watch_routes("printer", |route: ReachableRoute| {
//!     println!("{route}");
//! });
//! notifier.start().await?;
//! // ...
//! registration.close();
//! notifier.stop().await?;
//! # Ok(())
//! # }
//! ```

use tokio::sync::watch;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::DispatchLoop;
use crate::Error;
use crate::LoopState;
use crate::NotifierConfig;
use crate::RegistrationHandle;
use crate::Result;
use crate::RouteWatcher;
use crate::Session;
use crate::ShutdownError;
use crate::WatcherRegistry;

/// Everything owned by one running dispatch loop
struct RunningLoop {
    shutdown_tx: watch::Sender<()>,
    state_rx: watch::Receiver<LoopState>,
    handle: JoinHandle<()>,
}

pub struct RouteNotifier<S>
where
    S: Session,
{
    config: NotifierConfig,
    session: S,
    registry: WatcherRegistry,
    running: Mutex<Option<RunningLoop>>,
}

impl<S> RouteNotifier<S>
where
    S: Session,
{
    /// Creates a stopped notifier. Nothing is validated until [`RouteNotifier::start`].
    pub fn new(
        config: NotifierConfig,
        session: S,
    ) -> Self {
        Self {
            config,
            session,
            registry: WatcherRegistry::new(),
            running: Mutex::new(None),
        }
    }

    /// Starts the session, adds the configured peers and launches the dispatch loop.
    ///
    /// Returns once the loop has been spawned; it does not wait for the first event.
    /// Calling it while already running does nothing.
    ///
    /// # Errors
    /// - [`Error::Config`] if the session configuration is missing or invalid
    /// - [`Error::SessionStart`] if the session fails to start or to subscribe
    /// - [`Error::PeerSetup`] for the first peer that cannot be added
    ///
    /// When an error occurs after the session was started, the session is
    /// stopped again on a best-effort basis before returning.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!(notifier = %self.name(), "Already running, start ignored");
            return Ok(());
        }

        let session_config = self.config.session_config()?;
        self.config.clone().validate()?;

        info!(
            notifier = %self.name(),
            local_as = session_config.local_as,
            router_id = %session_config.router_id,
            peers = self.config.peers.len(),
            "Starting route notifier"
        );

        if let Err(e) = self.session.start(session_config).await {
            error!(notifier = %self.name(), "Failed to start session: {}", e);
            return Err(Error::SessionStart(e));
        }

        if let Err(e) = self.add_known_peers().await {
            self.stop_faulty_session().await;
            return Err(e);
        }

        let events = match self.session.subscribe_best_path().await {
            Ok(events) => events,
            Err(e) => {
                error!(notifier = %self.name(), "Failed to subscribe to best paths: {}", e);
                self.stop_faulty_session().await;
                return Err(Error::SessionStart(e));
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let dispatch_loop =
            DispatchLoop::new(self.name(), events, self.registry.clone(), shutdown_rx);
        let state_rx = dispatch_loop.state();
        let handle = tokio::spawn(dispatch_loop.run());

        *running = Some(RunningLoop {
            shutdown_tx,
            state_rx,
            handle,
        });
        info!(notifier = %self.name(), "Route notifier started");
        Ok(())
    }

    /// Stops the dispatch loop, waits for it to exit, then stops the session.
    ///
    /// A no-op returning `Ok(())` when not running, so calling it twice is fine.
    /// The session is stopped even if the loop did not terminate cleanly; the
    /// loop's error is the one reported in that case.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            debug!(notifier = %self.name(), "Not running, stop ignored");
            return Ok(());
        };

        info!(notifier = %self.name(), "Closing route notifier");

        // Fails only if the loop already exited on its own.
        if current.shutdown_tx.send(()).is_err() {
            debug!(notifier = %self.name(), "Dispatch loop already exited");
        }
        let loop_result = current.handle.await.map_err(|e| {
            error!(notifier = %self.name(), "Dispatch loop terminated abnormally: {}", e);
            ShutdownError::DispatchLoop(e)
        });

        let session_result = self.session.stop().await.map_err(|e| {
            warn!(notifier = %self.name(), "Failed to stop session: {}", e);
            ShutdownError::Session(e)
        });

        loop_result?;
        session_result?;

        info!(notifier = %self.name(), "Route notifier stopped");
        Ok(())
    }

    /// Registers `watcher` for every route dispatched from now on.
    ///
    /// Allowed at any time. Registering before [`RouteNotifier::start`] guarantees
    /// that no route reported by the session is missed. A watcher already
    /// registered under `identity` is replaced.
    ///
    /// Registration cannot fail, so the handle is returned directly rather than
    /// wrapped in a `Result`. Likewise [`RegistrationHandle::close`] reports
    /// whether it removed the watcher as a `bool` instead of an error.
    pub fn watch_routes(
        &self,
        identity: impl Into<String>,
        watcher: impl RouteWatcher,
    ) -> RegistrationHandle {
        self.registry.register(identity, watcher)
    }

    /// Removes the watcher registered under `identity`, if any.
    pub fn unwatch_routes(
        &self,
        identity: &str,
    ) -> bool {
        self.registry.unregister(identity)
    }

    /// Whether a dispatch loop has been started and not yet stopped.
    ///
    /// Stays `true` after the loop ended on its own (event source closed) until
    /// `stop()` is called.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Current state of the dispatch loop, `None` when not started.
    pub async fn loop_state(&self) -> Option<LoopState> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|r| *r.state_rx.borrow())
    }

    pub fn registry(&self) -> &WatcherRegistry {
        &self.registry
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn add_known_peers(&self) -> Result<()> {
        for peer in &self.config.peers {
            if let Err(e) = self.session.add_peer(peer).await {
                error!(
                    notifier = %self.name(),
                    peer_as = peer.peer_as,
                    address = %peer.neighbor_address,
                    "Failed to add peer: {}", e
                );
                return Err(Error::PeerSetup {
                    peer_as: peer.peer_as,
                    address: peer.neighbor_address,
                    source: e,
                });
            }
            debug!(notifier = %self.name(), address = %peer.neighbor_address, "Peer added");
        }
        Ok(())
    }

    async fn stop_faulty_session(&self) {
        if let Err(e) = self.session.stop().await {
            error!(notifier = %self.name(), "Error stopping partially started session: {}", e);
        }
    }
}
