//! An in-memory [`Session`] that never touches the network.
//!
//! Paths are fed in by the caller through [`LoopbackSession::advertise`], the way
//! a route reflector would announce them, and handed to every subscriber as a
//! best-path batch. Useful for embedding and for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;

use super::BestPath;
use super::EventSource;
use super::PeerState;
use super::Session;
use super::SessionEvent;
use crate::PeerConfig;
use crate::SessionConfig;
use crate::SessionError;

/// Creates a connected sender / [`ChannelEventSource`] pair.
pub fn event_channel() -> (mpsc::UnboundedSender<SessionEvent>, ChannelEventSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelEventSource::new(rx))
}

/// [`EventSource`] backed by a tokio channel
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ChannelEventSource {
    pub fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    fn stop(&mut self) {
        self.receiver.close();
    }
}

#[derive(Debug, Default)]
struct LoopbackState {
    config: Option<SessionConfig>,
    peers: Vec<PeerConfig>,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

#[derive(Debug, Default)]
pub struct LoopbackSession {
    state: Mutex<LoopbackState>,
}

impl LoopbackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().config.is_some()
    }

    /// Configuration the session was started with
    pub fn config(&self) -> Option<SessionConfig> {
        self.state.lock().config.clone()
    }

    /// Neighbors added since the session was started
    pub fn peers(&self) -> Vec<PeerConfig> {
        self.state.lock().peers.clone()
    }

    /// Number of open best-path subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Announces a batch of best paths to every subscriber.
    ///
    /// Returns how many subscribers the batch was handed to.
    pub fn advertise(
        &self,
        paths: Vec<BestPath>,
    ) -> Result<usize, SessionError> {
        self.inject(SessionEvent::BestPath(paths))
    }

    /// Hands an arbitrary raw event to every subscriber.
    pub fn inject(
        &self,
        event: SessionEvent,
    ) -> Result<usize, SessionError> {
        let mut state = self.state.lock();
        if state.config.is_none() {
            return Err(SessionError::NotRunning);
        }
        Ok(Self::broadcast(&mut state, event))
    }

    fn broadcast(
        state: &mut LoopbackState,
        event: SessionEvent,
    ) -> usize {
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        state.subscribers.len()
    }
}

#[async_trait]
impl Session for LoopbackSession {
    async fn start(
        &self,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.config.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        info!(local_as = config.local_as, router_id = %config.router_id, "Loopback session started");
        state.config = Some(config.clone());
        Ok(())
    }

    async fn add_peer(
        &self,
        peer: &PeerConfig,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.config.is_none() {
            return Err(SessionError::NotRunning);
        }
        if peer.peer_as == 0 {
            return Err(SessionError::InvalidPeer(format!(
                "neighbor {} has no AS number",
                peer.neighbor_address
            )));
        }
        if state
            .peers
            .iter()
            .any(|p| p.neighbor_address == peer.neighbor_address)
        {
            return Err(SessionError::DuplicatePeer(peer.neighbor_address));
        }

        debug!(peer_as = peer.peer_as, address = %peer.neighbor_address, "Neighbor added");
        state.peers.push(peer.clone());
        Self::broadcast(
            &mut state,
            SessionEvent::PeerStateChanged {
                address: peer.neighbor_address,
                state: PeerState::Established,
            },
        );
        Ok(())
    }

    async fn subscribe_best_path(&self) -> Result<Box<dyn EventSource>, SessionError> {
        let mut state = self.state.lock();
        if state.config.is_none() {
            return Err(SessionError::NotRunning);
        }
        let (tx, source) = event_channel();
        state.subscribers.push(tx);
        Ok(Box::new(source))
    }

    async fn stop(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.config.take().is_none() {
            return Err(SessionError::NotRunning);
        }
        state.peers.clear();
        // Dropping the senders closes every subscription.
        state.subscribers.clear();
        info!("Loopback session stopped");
        Ok(())
    }
}
