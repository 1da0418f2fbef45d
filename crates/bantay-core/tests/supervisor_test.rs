// Connection supervisor behavior against scripted in-memory boards.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use bantay_core::{
    BoardRole, CloudConfig, CloudLink, ConnectionStatus, ConnectionSupervisor, Endpoint,
    EventKind, LinkState, SupervisorEvent,
};
use common::{
    CAMERA_HOST, FakeCloud, MAIN_HOST, Outcome, ScriptedDialer, count, record_events, settle,
    test_config,
};

fn supervisor(dialer: &Arc<ScriptedDialer>) -> ConnectionSupervisor {
    ConnectionSupervisor::with_dialer(test_config(), Arc::clone(dialer) as _, None)
}

// ── Connecting ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connect_all_opens_both_links() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    let events = record_events(&sup);

    let status = sup.connect_all().await;
    settle().await;

    assert_eq!(
        status,
        ConnectionStatus {
            main: true,
            camera: true,
            fully_connected: true,
        }
    );
    assert!(sup.is_fully_connected());
    assert!(sup.last_open(BoardRole::Main).is_some());
    assert_eq!(count(&events, EventKind::MainConnected), 1);
    assert_eq!(count(&events, EventKind::CameraConnected), 1);
    assert!(
        events
            .lock()
            .unwrap()
            .contains(&SupervisorEvent::Connected(true))
    );
}

#[tokio::test(start_paused = true)]
async fn one_failing_link_does_not_block_the_other() {
    let dialer = ScriptedDialer::new();
    dialer.set_default(MAIN_HOST, Outcome::Hang);
    let sup = supervisor(&dialer);

    let status = sup.connect_all().await;

    assert!(!status.main);
    assert!(status.camera);
    assert!(!status.fully_connected);
    assert_eq!(sup.link_state(BoardRole::Camera), LinkState::Open);
}

#[tokio::test(start_paused = true)]
async fn repeated_connect_all_never_double_connects() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);

    sup.connect_all().await;
    sup.connect_all().await;
    settle().await;

    assert_eq!(dialer.dials(MAIN_HOST), 1);
    assert_eq!(dialer.dials(CAMERA_HOST), 1);
}

// ── Reconnect budget ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn exhausted_budget_falls_back_exactly_once() {
    let dialer = ScriptedDialer::new();
    dialer.set_default(MAIN_HOST, Outcome::Refuse);
    let sup = supervisor(&dialer);
    let events = record_events(&sup);

    sup.connect_all().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Initial attempt plus five reconnects.
    assert_eq!(dialer.dials(MAIN_HOST), 6);
    assert_eq!(count(&events, EventKind::Fallback), 1);
    assert!(
        events.lock().unwrap().contains(&SupervisorEvent::Fallback {
            board: BoardRole::Main
        })
    );
    assert!(sup.is_in_fallback(BoardRole::Main));
    assert!(!sup.is_in_fallback(BoardRole::Camera));
    assert_eq!(sup.reconnect_attempts(BoardRole::Main), 5);

    // No auto-reconnect while in fallback, however long we wait.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 6);

    // Still queryable and retryable after a reset.
    sup.reset_reconnection_attempts();
    assert_eq!(sup.reconnect_attempts(BoardRole::Main), 0);
    assert!(!sup.is_in_fallback(BoardRole::Main));

    sup.connect_all().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 12);
    assert_eq!(count(&events, EventKind::Fallback), 2);
}

#[tokio::test(start_paused = true)]
async fn errors_are_published_with_their_source() {
    let dialer = ScriptedDialer::new();
    dialer.push(MAIN_HOST, Outcome::Refuse);
    let sup = supervisor(&dialer);
    let events = record_events(&sup);

    sup.connect_all().await;
    settle().await;

    let errors: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            SupervisorEvent::Error { source, error } => Some((*source, error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, BoardRole::Main);
    assert!(errors[0].1.contains("refused"));
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_resets_the_counter() {
    let dialer = ScriptedDialer::new();
    dialer.push(MAIN_HOST, Outcome::Refuse);
    dialer.push(MAIN_HOST, Outcome::Refuse);
    let sup = supervisor(&dialer);

    sup.connect_all().await;
    settle().await;
    assert_eq!(sup.reconnect_attempts(BoardRole::Main), 1);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 3);
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Open);
    assert_eq!(sup.reconnect_attempts(BoardRole::Main), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_close_triggers_reconnect_after_interval() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    let events = record_events(&sup);

    sup.connect_all().await;
    settle().await;

    drop(dialer.take_peer(MAIN_HOST).unwrap());
    settle().await;
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Closed);
    assert!(
        events
            .lock()
            .unwrap()
            .contains(&SupervisorEvent::MainConnected(false))
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 2);
    assert!(sup.is_fully_connected());
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn disconnect_all_cancels_pending_reconnect() {
    let dialer = ScriptedDialer::new();
    dialer.set_default(MAIN_HOST, Outcome::Refuse);
    let sup = supervisor(&dialer);
    let events = record_events(&sup);

    sup.connect_all().await;
    settle().await;
    sup.disconnect_all().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(dialer.dials(MAIN_HOST), 1);
    assert_eq!(sup.link_state(BoardRole::Camera), LinkState::Closed);
    assert_eq!(count(&events, EventKind::Disconnected), 1);
    assert_eq!(count(&events, EventKind::Fallback), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_all_during_reconnect_attempt() {
    let dialer = ScriptedDialer::new();
    dialer.push(MAIN_HOST, Outcome::Refuse);
    dialer.set_default(MAIN_HOST, Outcome::Hang);
    let sup = supervisor(&dialer);

    sup.connect_all().await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Connecting);

    sup.disconnect_all().await;
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Closed);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(dialer.dials(MAIN_HOST), 2);
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_disconnect_all() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);

    sup.connect_all().await;
    sup.disconnect_all().await;
    assert!(!sup.is_fully_connected());

    let status = sup.connect_all().await;
    assert!(status.fully_connected);
    assert_eq!(dialer.dials(MAIN_HOST), 2);
}

// ── Data ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn camera_frames_are_classified() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    sup.connect_all().await;
    settle().await;
    let events = record_events(&sup);

    let peer = dialer.take_peer(CAMERA_HOST).unwrap();
    peer.send_json(&json!({ "type": "bird_detection", "count": 3 }));
    peer.send_json(&json!({ "type": "camera_status", "fps": 12 }));
    peer.send_json(&json!({ "type": "heartbeat" }));
    settle().await;

    let kinds: Vec<EventKind> = events.lock().unwrap().iter().map(SupervisorEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::CameraData,
            EventKind::Alert,
            EventKind::CameraData,
            EventKind::CameraStatus,
            EventKind::CameraData,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn main_frames_keep_order_and_skip_malformed() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    sup.connect_all().await;
    settle().await;
    let events = record_events(&sup);

    let peer = dialer.take_peer(MAIN_HOST).unwrap();
    peer.send_json(&json!({ "seq": 1 }));
    peer.send_text("{broken");
    peer.send_json(&json!({ "seq": 2 }));
    settle().await;

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            SupervisorEvent::MainData(json!({ "seq": 1 })),
            SupervisorEvent::MainData(json!({ "seq": 2 })),
        ]
    );
    assert_eq!(sup.link_state(BoardRole::Main), LinkState::Open);
}

#[tokio::test(start_paused = true)]
async fn send_goes_to_the_right_board() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    sup.connect_all().await;

    assert!(sup.send_to_main(&json!({ "action": "play_audio", "params": {} })));
    assert!(sup.send_to_camera(&json!({ "action": "set_brightness", "params": { "level": 1 } })));
    settle().await;

    let mut main = dialer.take_peer(MAIN_HOST).unwrap();
    let mut camera = dialer.take_peer(CAMERA_HOST).unwrap();
    assert_eq!(main.drain()[0]["action"], "play_audio");
    assert_eq!(camera.drain()[0]["action"], "set_brightness");
}

#[tokio::test(start_paused = true)]
async fn new_endpoint_is_used_on_next_connect() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);

    sup.set_endpoint(BoardRole::Main, Endpoint::new("main2.test", 8080, "/ws"));
    assert_eq!(sup.endpoints().main.to_string(), "main2.test:8080/ws");

    sup.connect_all().await;
    assert_eq!(dialer.dials("main2.test"), 1);
    assert_eq!(dialer.dials(MAIN_HOST), 0);
    assert_eq!(dialer.dials(CAMERA_HOST), 1);
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_handler_is_not_called() {
    let dialer = ScriptedDialer::new();
    let sup = supervisor(&dialer);
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = {
        let calls = Arc::clone(&calls);
        sup.subscribe(EventKind::MainConnected, move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    assert!(sup.unsubscribe(&sub));
    assert!(!sup.unsubscribe(&sub));

    sup.connect_all().await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── Cloud relay ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cloud_relay_runs_only_while_main_is_in_fallback() {
    let dialer = ScriptedDialer::new();
    dialer.set_default(MAIN_HOST, Outcome::Refuse);
    let cloud = Arc::new(FakeCloud::default());
    cloud.push_telemetry(json!({ "motion": 0, "dhtTemperature": 30 }));
    cloud.push_telemetry(json!({ "motion": 1, "dhtTemperature": 30 }));

    let mut config = test_config();
    config.max_reconnect_attempts = 1;
    config.reconnect_interval = Duration::from_secs(1);
    let sup = ConnectionSupervisor::with_dialer(
        config,
        Arc::clone(&dialer) as _,
        Some(CloudLink {
            backend: Arc::clone(&cloud) as _,
            config: CloudConfig {
                poll_interval: Duration::from_secs(5),
                ..CloudConfig::default()
            },
        }),
    );
    let events = record_events(&sup);

    sup.connect_all().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(sup.is_in_fallback(BoardRole::Main));

    // Two distinct documents, the second repeated on every later poll.
    assert_eq!(count(&events, EventKind::MainData), 2);
    assert!(*cloud.polls.lock().unwrap() > 2);

    // Main comes back: the relay stops.
    dialer.set_default(MAIN_HOST, Outcome::Accept);
    sup.reset_reconnection_attempts();
    sup.connect_all().await;
    settle().await;
    let polls = *cloud.polls.lock().unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(*cloud.polls.lock().unwrap(), polls);
}

#[tokio::test(start_paused = true)]
async fn zero_poll_interval_still_relays() {
    let dialer = ScriptedDialer::new();
    dialer.set_default(MAIN_HOST, Outcome::Refuse);
    let cloud = Arc::new(FakeCloud::default());
    cloud.push_telemetry(json!({ "motion": 1 }));

    let mut config = test_config();
    config.max_reconnect_attempts = 0;
    let sup = ConnectionSupervisor::with_dialer(
        config,
        Arc::clone(&dialer) as _,
        Some(CloudLink {
            backend: Arc::clone(&cloud) as _,
            config: CloudConfig {
                poll_interval: Duration::ZERO,
                ..CloudConfig::default()
            },
        }),
    );
    let events = record_events(&sup);

    sup.connect_all().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(sup.is_in_fallback(BoardRole::Main));
    assert_eq!(count(&events, EventKind::MainData), 1);
    assert!(*cloud.polls.lock().unwrap() > 1);
}
