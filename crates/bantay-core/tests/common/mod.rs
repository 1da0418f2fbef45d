// Shared test fixtures: a scripted in-memory dialer and a fake cloud store.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::SinkExt;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

use bantay_api::{CloudBackend, Dialer, Endpoint, Error, FrameSink, FrameStream};
use bantay_core::{ConnectionSupervisor, EventKind, SupervisorConfig, SupervisorEvent};
use strum::IntoEnumIterator;

pub const MAIN_HOST: &str = "main.test";
pub const CAMERA_HOST: &str = "camera.test";

// ── Dialer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Refuse,
    Hang,
}

/// Board side of an accepted in-memory connection.
pub struct Peer {
    to_client: mpsc::UnboundedSender<Result<String, Error>>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn send_text(&self, text: &str) {
        self.to_client.unbounded_send(Ok(text.to_owned())).unwrap();
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    /// Received frames so far, parsed.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(Some(text)) = self.from_client.try_next() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }
}

#[derive(Default)]
struct DialerState {
    scripts: HashMap<String, VecDeque<Outcome>>,
    defaults: HashMap<String, Outcome>,
    dials: HashMap<String, usize>,
    peers: HashMap<String, Vec<Peer>>,
}

/// Dialer whose per-host outcomes are scripted by the test.
#[derive(Default)]
pub struct ScriptedDialer {
    state: Mutex<DialerState>,
}

impl ScriptedDialer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Outcome used once the host's script is exhausted (initially `Accept`).
    pub fn set_default(&self, host: &str, outcome: Outcome) {
        self.state
            .lock()
            .unwrap()
            .defaults
            .insert(host.to_owned(), outcome);
    }

    /// Queue a one-shot outcome for the host's next dial.
    pub fn push(&self, host: &str, outcome: Outcome) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(host.to_owned())
            .or_default()
            .push_back(outcome);
    }

    pub fn dials(&self, host: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .dials
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    /// Most recent accepted connection for `host`.
    pub fn take_peer(&self, host: &str) -> Option<Peer> {
        self.state.lock().unwrap().peers.get_mut(host)?.pop()
    }
}

impl Dialer for ScriptedDialer {
    fn dial(&self, url: Url) -> BoxFuture<'static, Result<(FrameSink, FrameStream), Error>> {
        let host = url.host_str().unwrap_or_default().to_owned();
        let mut state = self.state.lock().unwrap();
        *state.dials.entry(host.clone()).or_default() += 1;

        let scripted = state.scripts.get_mut(&host).and_then(VecDeque::pop_front);
        let outcome = scripted
            .or_else(|| state.defaults.get(&host).copied())
            .unwrap_or(Outcome::Accept);

        match outcome {
            Outcome::Hang => futures::future::pending().boxed(),
            Outcome::Refuse => {
                async move { Err(Error::WebSocketConnect(format!("{host} refused"))) }.boxed()
            }
            Outcome::Accept => {
                let (to_client, client_rx) = mpsc::unbounded();
                let (client_tx, from_client) = mpsc::unbounded::<String>();
                state.peers.entry(host).or_default().push(Peer {
                    to_client,
                    from_client,
                });
                let sink: FrameSink =
                    Box::pin(client_tx.sink_map_err(|e| Error::WebSocketConnect(e.to_string())));
                let stream: FrameStream = Box::pin(client_rx);
                async move { Ok((sink, stream)) }.boxed()
            }
        }
    }
}

// ── Cloud ───────────────────────────────────────────────────────────

/// In-memory cloud store: a queue of telemetry documents (the last one
/// repeats) and a log of queued commands.
#[derive(Default)]
pub struct FakeCloud {
    telemetry: Mutex<VecDeque<Value>>,
    pub polls: Mutex<usize>,
    pub commands: Mutex<Vec<(String, String, Value)>>,
}

impl FakeCloud {
    pub fn push_telemetry(&self, doc: Value) {
        self.telemetry.lock().unwrap().push_back(doc);
    }
}

impl CloudBackend for FakeCloud {
    fn latest_telemetry<'a>(
        &'a self,
        _device_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>> {
        *self.polls.lock().unwrap() += 1;
        let mut queue = self.telemetry.lock().unwrap();
        let doc = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        async move { Ok(doc) }.boxed()
    }

    fn send_command<'a>(
        &'a self,
        device_id: &'a str,
        action: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<String, Error>> {
        let mut commands = self.commands.lock().unwrap();
        commands.push((device_id.to_owned(), action.to_owned(), params));
        let id = format!("cmd-{}", commands.len());
        async move { Ok(id) }.boxed()
    }
}

// ── Supervisor helpers ──────────────────────────────────────────────

pub fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        main: Endpoint::new(MAIN_HOST, 80, "/ws"),
        camera: Endpoint::new(CAMERA_HOST, 80, "/ws"),
        ..SupervisorConfig::default()
    }
}

/// Record every event the supervisor publishes, in publish order.
pub fn record_events(sup: &ConnectionSupervisor) -> Arc<Mutex<Vec<SupervisorEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::iter() {
        let log = Arc::clone(&log);
        sup.subscribe(kind, move |event| {
            log.lock().unwrap().push(event.clone());
            Ok(())
        });
    }
    log
}

pub fn count(events: &Mutex<Vec<SupervisorEvent>>, kind: EventKind) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == kind)
        .count()
}

/// Let every ready task run (time is paused in these tests).
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
