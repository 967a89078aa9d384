use std::fmt;
use std::net::IpAddr;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::RouteWatcher;

/// A destination that became reachable through a new best path
///
/// Produced only by the translator. Every watcher receives its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReachableRoute {
    /// Origin autonomous system of the best path
    pub as_number: u32,
    /// Destination prefix in CIDR notation, e.g. `10.0.0.0/24`
    pub prefix: String,
    pub nexthop: IpAddr,
}

impl ReachableRoute {
    pub fn new(
        as_number: u32,
        prefix: impl Into<String>,
        nexthop: IpAddr,
    ) -> Self {
        Self {
            as_number,
            prefix: prefix.into(),
            nexthop,
        }
    }
}

impl fmt::Display for ReachableRoute {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} via {} (AS {})", self.prefix, self.nexthop, self.as_number)
    }
}

/// Adapts a channel sender into a watcher that forwards every route it is notified of.
///
/// The channel is unbounded so forwarding never blocks the dispatch loop. Routes
/// notified after the receiver was dropped are discarded.
pub fn to_channel(sender: mpsc::UnboundedSender<ReachableRoute>) -> impl RouteWatcher {
    move |route: ReachableRoute| {
        debug!(%route, "Forwarding route to channel");
        if sender.send(route).is_err() {
            debug!("Route channel receiver dropped, route discarded");
        }
    }
}
