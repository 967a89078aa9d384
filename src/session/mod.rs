//! Abstraction over the routing-protocol session.
//!
//! The session (peer negotiation, path selection, wire decoding) lives outside
//! this crate. The notifier only needs to start and stop it, add the statically
//! configured peers and subscribe to its best-path updates.
mod loopback;
pub use loopback::*;


use std::net::IpAddr;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::PeerConfig;
use crate::SessionConfig;
use crate::SessionError;

/// One path selected as best by the session, in the session's own rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestPath {
    /// Destination prefix in CIDR notation
    pub prefix: String,
    /// AS path rendered as text, e.g. `65000` or `65000 65010`
    pub as_path: String,
    pub nexthop: IpAddr,
}

impl BestPath {
    pub fn new(
        prefix: impl Into<String>,
        as_path: impl Into<String>,
        nexthop: IpAddr,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            as_path: as_path.into(),
            nexthop,
        }
    }
}

/// BGP finite state machine states of a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

/// Raw events emitted by a session subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A batch of new best paths
    BestPath(Vec<BestPath>),

    /// A neighbor changed state. Not translated into routes.
    PeerStateChanged { address: IpAddr, state: PeerState },
}

impl SessionEvent {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SessionEvent::BestPath(_) => "best_path",
            SessionEvent::PeerStateChanged { .. } => "peer_state",
        }
    }
}

/// Ordered stream of session events
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Waits for the next event. `None` means the stream has been closed by the session.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    /// Unsubscribes. Events already queued may still be returned afterwards.
    fn stop(&mut self);
}

/// The external routing session
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Starts the local speaker with its global configuration.
    async fn start(
        &self,
        config: &SessionConfig,
    ) -> std::result::Result<(), SessionError>;

    /// Adds a neighbor to a started session.
    async fn add_peer(
        &self,
        peer: &PeerConfig,
    ) -> std::result::Result<(), SessionError>;

    /// Subscribes to best-path updates of a started session.
    async fn subscribe_best_path(&self) -> std::result::Result<Box<dyn EventSource>, SessionError>;

    /// Stops the session and closes every subscription it handed out.
    async fn stop(&self) -> std::result::Result<(), SessionError>;
}
