//! Conversion of raw session events into [`ReachableRoute`]s.
//!
//! All protocol-specific field extraction happens here. A path that cannot be
//! converted is skipped; it never prevents the rest of its batch from being
//! delivered.

use tracing::warn;

use crate::metrics::ROUTES_TRANSLATED;
use crate::metrics::TRANSLATION_FAILURES;
use crate::BestPath;
use crate::ReachableRoute;
use crate::SessionEvent;
use crate::TranslationError;

/// Translates one session event into zero or more routes, in batch order.
///
/// Event kinds other than best-path batches yield nothing.
pub fn translate(event: &SessionEvent) -> Vec<ReachableRoute> {
    let SessionEvent::BestPath(paths) = event else {
        return Vec::new();
    };

    let mut routes = Vec::with_capacity(paths.len());
    for path in paths {
        match translate_path(path) {
            Ok(route) => routes.push(route),
            Err(e) => {
                TRANSLATION_FAILURES.inc();
                warn!(prefix = %path.prefix, "Ignoring path due to parse error: {}", e);
            }
        }
    }
    ROUTES_TRANSLATED.inc_by(routes.len() as u64);
    routes
}

/// Translates a single best path.
///
/// The AS path must consist of exactly one 32-bit AS number.
pub fn translate_path(path: &BestPath) -> Result<ReachableRoute, TranslationError> {
    let as_number = path
        .as_path
        .trim()
        .parse::<u32>()
        .map_err(|source| TranslationError::InvalidAsPath {
            as_path: path.as_path.clone(),
            source,
        })?;

    Ok(ReachableRoute {
        as_number,
        prefix: path.prefix.clone(),
        nexthop: path.nexthop,
    })
}
