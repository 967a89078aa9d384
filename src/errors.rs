//! Error hierarchy for the route notification core.
//!
//! Session-level failures are returned to the caller of `start`/`stop`.
//! Per-event translation failures never leave the dispatch loop; they are
//! logged and the offending path is skipped.

use std::net::IpAddr;
use std::num::ParseIntError;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid session configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The routing session refused to start or to hand out a best-path subscription
    #[error("Failed to start routing session: {0}")]
    SessionStart(#[source] SessionError),

    /// A statically configured peer could not be added
    #[error("Failed to add peer {address} (AS {peer_as}): {source}")]
    PeerSetup {
        peer_as: u32,
        address: IpAddr,
        #[source]
        source: SessionError,
    },

    /// Failure while tearing down the dispatch loop or the session
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Errors reported by a routing session implementation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is not running")]
    NotRunning,

    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Peer {0} is already configured")]
    DuplicatePeer(IpAddr),

    #[error("Invalid peer configuration: {0}")]
    InvalidPeer(String),

    /// Opaque failure from the underlying protocol engine
    #[error("Session backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    /// The dispatch task did not terminate normally
    #[error("Dispatch loop terminated abnormally: {0}")]
    DispatchLoop(#[from] JoinError),

    #[error("Failed to stop routing session: {0}")]
    Session(#[source] SessionError),
}

/// A single best path that could not be turned into a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("AS path '{as_path}' is not a single 32-bit AS number: {source}")]
    InvalidAsPath {
        as_path: String,
        #[source]
        source: ParseIntError,
    },
}
