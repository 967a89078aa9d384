//! Watch mechanism delivering reachable routes to registered watchers
//!
//! ```text
//! ┌──────────────┐
//! │   Session    │ (external)
//! └──────┬───────┘
//!        │ best-path events
//!        ▼
//! ┌──────────────┐     ┌─────────────────┐
//! │ DispatchLoop │────►│   translate()   │
//! │ (tokio task) │◄────│ ReachableRoute* │
//! └──────┬───────┘     └─────────────────┘
//!        │ snapshot() per route (lock-free)
//!        ▼
//! ┌──────────────────┐
//! │ WatcherRegistry  │ identity -> RouteWatcher
//! └──────┬───────────┘
//!        │ notify(route), sequential
//!        ▼
//!     watchers
//! ```
//!
//! # Delivery guarantees
//!
//! - A watcher registered before a route is dispatched receives it exactly once.
//! - A watcher registered after the snapshot for a route was taken never receives it.
//! - Once a registration is closed, routes dispatched afterwards are not delivered
//!   to it. A route whose snapshot was taken before the close may still arrive.
//! - Events are delivered in the order the session produced them.
mod dispatch_loop;
mod registry;
mod translator;

#[cfg(test)]
mod translator_test;

pub use dispatch_loop::*;
pub use registry::*;
pub use translator::*;
