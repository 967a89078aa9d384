use std::net::IpAddr;

use config::ConfigError;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio::time::Duration;

use super::*;
use crate::event_channel;
use crate::test_utils::enable_logger;
use crate::to_channel;
use crate::BestPath;
use crate::Error;
use crate::LoopState;
use crate::LoopbackSession;
use crate::MockSession;
use crate::NotifierConfig;
use crate::PeerConfig;
use crate::ReachableRoute;
use crate::RegistrationHandle;
use crate::Session;
use crate::SessionConfig;
use crate::SessionError;
use crate::ShutdownError;

const RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);
const SILENCE_TIMEOUT: Duration = Duration::from_millis(100);

fn ip(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}

fn notifier_config() -> NotifierConfig {
    NotifierConfig::default()
        .with_session(SessionConfig::new(65001, "172.18.0.2"))
        .with_peer(PeerConfig::new(65000, ip("127.0.0.1")).with_remote_port(10179))
}

fn reflector_path(
    prefix: &str,
    nexthop: &str,
) -> BestPath {
    BestPath::new(prefix, "65000", ip(nexthop))
}

fn watch_channel<S: Session>(
    notifier: &RouteNotifier<S>,
    identity: &str,
) -> (RegistrationHandle, mpsc::UnboundedReceiver<ReachableRoute>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (notifier.watch_routes(identity, to_channel(tx)), rx)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<ReachableRoute>) -> ReachableRoute {
    timeout(RECEIVE_TIMEOUT, rx.recv())
        .await
        .expect("Timeout waiting for route")
        .expect("Channel closed")
}

async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<ReachableRoute>) {
    // A closed channel means the watcher is gone, which is silent as well.
    let result = timeout(SILENCE_TIMEOUT, rx.recv()).await;
    assert!(!matches!(result, Ok(Some(_))), "Unexpected route received: {result:?}");
}

/// Mock whose start, add_peer and subscribe all succeed.
fn healthy_mock() -> MockSession {
    let mut session = MockSession::new();
    session.expect_start().times(1).returning(|_| Ok(()));
    session.expect_add_peer().returning(|_| Ok(()));
    session.expect_subscribe_best_path().return_once(|| {
        let (tx, source) = event_channel();
        // Keep the stream open for the lifetime of the test.
        std::mem::forget(tx);
        Ok(Box::new(source))
    });
    session
}

#[tokio::test]
async fn test_start_without_session_config_fails() {
    enable_logger();
    let mut session = MockSession::new();
    session.expect_start().never();

    let notifier = RouteNotifier::new(NotifierConfig::default(), session);
    let result = notifier.start().await;

    assert!(matches!(result, Err(Error::Config(ConfigError::NotFound(_)))));
    assert!(!notifier.is_running().await);
}

#[tokio::test]
async fn test_start_with_invalid_config_fails_before_session() {
    let mut session = MockSession::new();
    session.expect_start().never();
    let config = NotifierConfig::default().with_session(SessionConfig::new(0, "172.18.0.2"));

    let notifier = RouteNotifier::new(config, session);

    assert!(matches!(notifier.start().await, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_session_start_failure_is_reported() {
    let mut session = MockSession::new();
    session
        .expect_start()
        .times(1)
        .returning(|_| Err(SessionError::Backend("bind failed".to_string())));
    session.expect_add_peer().never();
    session.expect_stop().never();

    let notifier = RouteNotifier::new(notifier_config(), session);

    assert!(matches!(notifier.start().await, Err(Error::SessionStart(_))));
    assert!(!notifier.is_running().await);
}

#[tokio::test]
async fn test_peer_failure_stops_session_and_names_the_peer() {
    let mut session = MockSession::new();
    session.expect_start().times(1).returning(|_| Ok(()));
    session
        .expect_add_peer()
        .times(1)
        .returning(|peer| Err(SessionError::DuplicatePeer(peer.neighbor_address)));
    session.expect_subscribe_best_path().never();
    session.expect_stop().times(1).returning(|| Ok(()));

    let notifier = RouteNotifier::new(notifier_config(), session);

    match notifier.start().await {
        Err(Error::PeerSetup { peer_as, address, .. }) => {
            assert_eq!(peer_as, 65000);
            assert_eq!(address, ip("127.0.0.1"));
        }
        other => panic!("Unexpected start result: {other:?}"),
    }
    assert!(!notifier.is_running().await);
}

#[tokio::test]
async fn test_subscribe_failure_stops_session() {
    let mut session = MockSession::new();
    session.expect_start().times(1).returning(|_| Ok(()));
    session.expect_add_peer().returning(|_| Ok(()));
    session
        .expect_subscribe_best_path()
        .times(1)
        .return_once(|| Err(SessionError::Backend("no stream".to_string())));
    session.expect_stop().times(1).returning(|| Ok(()));

    let notifier = RouteNotifier::new(notifier_config(), session);

    assert!(matches!(notifier.start().await, Err(Error::SessionStart(_))));
    assert!(!notifier.is_running().await);
}

#[tokio::test]
async fn test_start_twice_is_a_noop() {
    let session = healthy_mock();
    let notifier = RouteNotifier::new(notifier_config(), session);

    notifier.start().await.unwrap();
    notifier.start().await.unwrap();

    assert!(notifier.is_running().await);
    assert_eq!(notifier.loop_state().await, Some(LoopState::Running));
}

#[tokio::test]
async fn test_stop_when_not_running_is_a_noop() {
    let mut session = MockSession::new();
    session.expect_stop().never();
    let notifier = RouteNotifier::new(notifier_config(), session);

    notifier.stop().await.unwrap();
    assert_eq!(notifier.loop_state().await, None);
}

#[tokio::test]
async fn test_session_stop_error_is_reported_after_loop_exit() {
    let mut session = healthy_mock();
    session
        .expect_stop()
        .times(1)
        .returning(|| Err(SessionError::Backend("socket busy".to_string())));
    let notifier = RouteNotifier::new(notifier_config(), session);
    notifier.start().await.unwrap();

    let result = notifier.stop().await;

    assert!(matches!(
        result,
        Err(Error::Shutdown(ShutdownError::Session(SessionError::Backend(_))))
    ));
    assert!(!notifier.is_running().await);
    // The slot is released even on error, so a second stop does nothing.
    notifier.stop().await.unwrap();
}

#[tokio::test]
async fn test_loopback_lifecycle_adds_configured_peers() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());

    notifier.start().await.unwrap();
    let session = notifier.session();
    assert!(session.is_running());
    assert_eq!(session.peers().len(), 1);
    assert_eq!(session.peers()[0].transport.remote_port, Some(10179));
    assert_eq!(session.subscriber_count(), 1);

    notifier.stop().await.unwrap();
    assert!(!session.is_running());
    assert_eq!(session.subscriber_count(), 0);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());
    let (_handle, mut rx) = watch_channel(&notifier, "T1");

    notifier.start().await.unwrap();
    notifier.stop().await.unwrap();
    notifier.start().await.unwrap();

    notifier
        .session()
        .advertise(vec![reflector_path("10.0.0.0/24", "10.0.0.1")])
        .unwrap();
    assert_eq!(recv(&mut rx).await.prefix, "10.0.0.0/24");

    notifier.stop().await.unwrap();
}

#[tokio::test]
async fn test_registration_before_start_sees_first_route() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());
    let (_handle, mut rx) = watch_channel(&notifier, "early");

    notifier.start().await.unwrap();
    notifier
        .session()
        .advertise(vec![reflector_path("10.0.0.0/24", "10.0.0.1")])
        .unwrap();

    assert_eq!(
        recv(&mut rx).await,
        ReachableRoute::new(65000, "10.0.0.0/24", ip("10.0.0.1"))
    );
    notifier.stop().await.unwrap();
}

#[tokio::test]
async fn test_unwatch_routes_stops_delivery() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = notifier.watch_routes("T1", to_channel(tx.clone()));
    notifier.start().await.unwrap();

    assert!(notifier.unwatch_routes("T1"));
    assert!(!notifier.unwatch_routes("T1"));
    notifier
        .session()
        .advertise(vec![reflector_path("10.0.0.0/24", "10.0.0.1")])
        .unwrap();

    assert_silent(&mut rx).await;
    notifier.stop().await.unwrap();
}

#[tokio::test]
async fn test_no_delivery_after_stop() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());
    let (_handle, mut rx) = watch_channel(&notifier, "T1");
    notifier.start().await.unwrap();
    notifier.stop().await.unwrap();

    assert!(notifier.session().advertise(vec![]).is_err());
    assert_eq!(notifier.loop_state().await, None);
    assert_silent(&mut rx).await;
}

#[tokio::test]
async fn test_loop_state_reflects_closed_stream() {
    let notifier = RouteNotifier::new(notifier_config(), LoopbackSession::new());
    notifier.start().await.unwrap();

    // Stopping the session behind the notifier's back closes the stream.
    notifier.session().stop().await.unwrap();
    timeout(RECEIVE_TIMEOUT, async {
        while notifier.loop_state().await != Some(LoopState::Stopped) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loop did not stop");

    assert!(notifier.is_running().await);
    // The session is already down, so stopping reports it.
    assert!(matches!(
        notifier.stop().await,
        Err(Error::Shutdown(ShutdownError::Session(SessionError::NotRunning)))
    ));
}
