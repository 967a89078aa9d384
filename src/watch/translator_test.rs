use std::net::IpAddr;

use super::*;
use crate::BestPath;
use crate::PeerState;
use crate::ReachableRoute;
use crate::SessionEvent;
use crate::TranslationError;

fn nexthop(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}

#[test]
fn best_path_batch_yields_one_route_per_path_in_order() {
    let event = SessionEvent::BestPath(vec![
        BestPath::new("10.0.0.0/24", "65000", nexthop("10.0.0.1")),
        BestPath::new("10.0.1.0/24", "65002", nexthop("10.0.0.3")),
        BestPath::new("2001:db8::/32", "4200000000", nexthop("2001:db8::1")),
    ]);

    let routes = translate(&event);

    assert_eq!(
        routes,
        vec![
            ReachableRoute::new(65000, "10.0.0.0/24", nexthop("10.0.0.1")),
            ReachableRoute::new(65002, "10.0.1.0/24", nexthop("10.0.0.3")),
            ReachableRoute::new(4_200_000_000, "2001:db8::/32", nexthop("2001:db8::1")),
        ]
    );
}

#[test]
fn malformed_as_path_is_skipped_and_rest_of_batch_survives() {
    let event = SessionEvent::BestPath(vec![
        BestPath::new("10.0.0.0/24", "not-a-number", nexthop("10.0.0.1")),
        BestPath::new("10.0.1.0/24", "65000", nexthop("10.0.0.1")),
    ]);

    let routes = translate(&event);

    assert_eq!(routes, vec![ReachableRoute::new(65000, "10.0.1.0/24", nexthop("10.0.0.1"))]);
}

#[test]
fn multi_hop_and_oversized_as_paths_are_rejected() {
    for as_path in ["65000 65010", "4294967296", "", "-1"] {
        let result = translate_path(&BestPath::new("10.0.0.0/24", as_path, nexthop("10.0.0.1")));

        match result {
            Err(TranslationError::InvalidAsPath { as_path: rejected, .. }) => {
                assert_eq!(rejected, as_path)
            }
            other => panic!("as_path {as_path:?} should be rejected, got {other:?}"),
        }
    }
}

#[test]
fn surrounding_whitespace_in_as_path_is_tolerated() {
    let route = translate_path(&BestPath::new("10.0.0.0/24", " 65000 ", nexthop("10.0.0.1"))).unwrap();

    assert_eq!(route.as_number, 65000);
}

#[test]
fn non_best_path_events_yield_nothing() {
    let event = SessionEvent::PeerStateChanged {
        address: nexthop("127.0.0.1"),
        state: PeerState::Established,
    };

    assert!(translate(&event).is_empty());
}

#[test]
fn empty_batch_yields_nothing() {
    assert!(translate(&SessionEvent::BestPath(vec![])).is_empty());
}
