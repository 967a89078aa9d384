//! Prometheus collectors describing the notification path.
//!
//! Collectors are registered into [`REGISTRY`] on first use. Exporting them is
//! left to the host, see [`gather_metrics`].

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;

lazy_static! {
    pub static ref EVENTS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("bgp_watch_events_received", "Session events consumed by the dispatch loop"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref ROUTES_TRANSLATED: IntCounter = IntCounter::new(
        "bgp_watch_routes_translated",
        "Best paths translated into reachable routes"
    )
    .expect("metric can not be created");

    pub static ref TRANSLATION_FAILURES: IntCounter = IntCounter::new(
        "bgp_watch_translation_failures",
        "Best paths skipped because they could not be translated"
    )
    .expect("metric can not be created");

    pub static ref ROUTES_DELIVERED: IntCounter = IntCounter::new(
        "bgp_watch_routes_delivered",
        "Route notifications handed to watchers"
    )
    .expect("metric can not be created");

    pub static ref WATCHER_PANICS: IntCounter = IntCounter::new(
        "bgp_watch_watcher_panics",
        "Watcher callbacks that panicked while being notified"
    )
    .expect("metric can not be created");

    pub static ref REGISTERED_WATCHERS: IntGauge = IntGauge::new(
        "bgp_watch_registered_watchers",
        "Watchers currently registered across all registries"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Registers every collector into [`REGISTRY`]. Safe to call repeatedly.
pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(EVENTS_RECEIVED.clone()),
            Box::new(ROUTES_TRANSLATED.clone()),
            Box::new(TRANSLATION_FAILURES.clone()),
            Box::new(ROUTES_DELIVERED.clone()),
            Box::new(WATCHER_PANICS.clone()),
            Box::new(REGISTERED_WATCHERS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                error!("collector can not be registered: {}", e);
            }
        }
    });
}

/// Renders [`REGISTRY`] in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    register_custom_metrics();

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
