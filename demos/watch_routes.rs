//! Registers a watcher, starts a notifier and waits for the first reachable route.
//!
//! The loopback session stands in for the BGP speaker: once started, a helper
//! task announces the path a route reflector at 172.18.0.2 would send.
//!
//! ```text
//! RUST_LOG=bgp_watch=debug cargo run --example watch_routes
//! ```

use std::error::Error;
use std::result::Result;
use std::sync::Arc;
use std::time::Duration;

use bgp_watch::*;
use tokio::sync::mpsc;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const FIRST_ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = NotifierConfig::new()?
        .with_session(SessionConfig::new(65000, "172.18.0.254"))
        .with_peer(PeerConfig::new(65001, "172.18.0.2".parse()?))
        .validate()?;
    let notifier = Arc::new(RouteNotifier::new(config, LoopbackSession::new()));

    // Registered before start, so the very first route is not missed.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let registration = notifier.watch_routes("pluginExample", to_channel(tx));

    notifier.start().await?;
    tokio::spawn(announce_reflector_path(Arc::clone(&notifier)));

    match tokio::time::timeout(FIRST_ROUTE_TIMEOUT, rx.recv()).await {
        Ok(Some(route)) => info!(%route, "Reachable route received"),
        Ok(None) => warn!("Watcher channel closed before any route arrived"),
        Err(_) => warn!("No route received within {:?}", FIRST_ROUTE_TIMEOUT),
    }

    notifier.stop().await?;
    registration.close();
    info!("Example finished");
    Ok(())
}

async fn announce_reflector_path(notifier: Arc<RouteNotifier<LoopbackSession>>) {
    let path = BestPath::new("10.0.0.0/24", "65001", "172.18.0.2".parse().expect("valid address"));
    if let Err(e) = notifier.session().advertise(vec![path]) {
        warn!("Announcement rejected: {}", e);
    }
}
