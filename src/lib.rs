//! Route-reachability notifications on top of a BGP session.
//!
//! A [`RouteNotifier`] starts a routing [`Session`], adds the statically
//! configured peers and subscribes to the session's best-path updates. Every
//! best path is translated into a [`ReachableRoute`] and handed to each
//! [`RouteWatcher`] registered at that moment.
//!
//! ```rust,no_run
//! use bgp_watch::*;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<()> {
//! let config = NotifierConfig::new()?
//!     .with_session(SessionConfig::new(65001, "172.18.0.2"))
//!     .with_peer(PeerConfig::new(65000, "127.0.0.1".parse().unwrap()).with_remote_port(10179))
//!     .validate()?;
//!
//! let notifier = RouteNotifier::new(config, LoopbackSession::new());
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let registration = notifier.watch_routes("T1", to_channel(tx));
//!
//! notifier.start().await?;
//! if let Some(route) = rx.recv().await {
//!     println!("reachable: {route}");
//! }
//! registration.close();
//! notifier.stop().await?;
//! # Ok(())
//! # }
//! ```
mod config;
mod errors;
mod notifier;
mod route;
mod session;
mod watch;

pub mod metrics;

pub use config::*;
pub use errors::*;
pub use notifier::*;
pub use route::*;
pub use session::*;
pub use watch::*;

#[cfg(test)]
pub(crate) mod test_utils;
