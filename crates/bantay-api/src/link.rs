//! One live, message-oriented connection to one board endpoint.
//!
//! A [`TransportLink`] owns at most one underlying connection at a time.
//! It knows how to make a single connection attempt, send JSON frames while
//! open, and release the connection on every exit path. It never reconnects
//! on its own: every lifecycle change is reported as a [`LinkSignal`] on the
//! channel handed in at construction, and the owner decides what to do.
//!
//! ```rust,ignore
//! let (signal_tx, mut signal_rx) = tokio::sync::mpsc::unbounded_channel();
//! let link = TransportLink::new(BoardRole::Main, endpoint, Arc::new(WebSocketDialer), signal_tx);
//!
//! if link.connect(Duration::from_secs(5)).await {
//!     link.send(&serde_json::json!({"action": "play_audio", "params": {}}));
//! }
//! while let Some(signal) = signal_rx.recv().await { /* ... */ }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::dial::{Dialer, FrameSink, FrameStream};
use crate::error::Error;
use crate::frame;

/// How long a closing link waits for the peer to acknowledge the close.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Upper bound on how long `close()` waits for an aborted attempt to settle.
const ABORT_SETTLE: Duration = Duration::from_secs(1);

// ── Identity ─────────────────────────────────────────────────────────

/// Which of the two boards a link talks to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoardRole {
    /// Main controller board: sensors, audio, motors, servos.
    Main,
    /// Camera board: snapshots and bird detection.
    Camera,
}

/// Network location of a board's WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// `ws://{host}:{port}{path}`, with a leading `/` added to the path if missing.
    pub fn url(&self) -> Result<Url, Error> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        Ok(Url::parse(&format!("ws://{}:{}{path}", self.host, self.port))?)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

// ── State ────────────────────────────────────────────────────────────

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkState {
    /// Never connected.
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl LinkState {
    /// A new attempt may only start from here.
    pub fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }
}

/// Lifecycle notifications, delivered in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkSignal {
    /// The connection is established.
    Opened,
    /// One parsed inbound frame.
    Frame(Value),
    /// A connection error (handshake failure or stream error).
    Error(String),
    /// The link reached `Closed`. `requested` is `true` when the close was
    /// asked for through [`TransportLink::close`].
    Closed { requested: bool },
}

// ── TransportLink ────────────────────────────────────────────────────

/// Handle to one board link. Cheaply cloneable.
#[derive(Clone)]
pub struct TransportLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    role: BoardRole,
    endpoint: ArcSwap<Endpoint>,
    dialer: Arc<dyn Dialer>,
    state: watch::Sender<LinkState>,
    signals: mpsc::UnboundedSender<LinkSignal>,
    /// Writer queue of the open session; `None` whenever the link is not open.
    outbound: ArcSwapOption<mpsc::UnboundedSender<String>>,
    /// Abort switch for an attempt that is still dialing.
    pending_attempt: ArcSwapOption<CancellationToken>,
    session: Mutex<Option<Session>>,
    last_open: ArcSwapOption<DateTime<Utc>>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TransportLink {
    pub fn new(
        role: BoardRole,
        endpoint: Endpoint,
        dialer: Arc<dyn Dialer>,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Idle);
        Self {
            inner: Arc::new(LinkInner {
                role,
                endpoint: ArcSwap::from_pointee(endpoint),
                dialer,
                state,
                signals,
                outbound: ArcSwapOption::empty(),
                pending_attempt: ArcSwapOption::empty(),
                session: Mutex::new(None),
                last_open: ArcSwapOption::empty(),
            }),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == LinkState::Open
    }

    pub fn endpoint(&self) -> Endpoint {
        self.inner.endpoint.load().as_ref().clone()
    }

    /// Replace the endpoint. Takes effect on the next connection attempt.
    pub fn set_endpoint(&self, endpoint: Endpoint) {
        info!(board = %self.inner.role, endpoint = %endpoint, "endpoint updated");
        self.inner.endpoint.store(Arc::new(endpoint));
    }

    /// When the link last reached `Open`.
    pub fn last_open(&self) -> Option<DateTime<Utc>> {
        self.inner.last_open.load_full().map(|t| *t)
    }

    // ── Connect ──────────────────────────────────────────────────────

    /// Make one connection attempt bounded by `timeout`.
    ///
    /// Returns `true` once the link is open. While another attempt is in
    /// flight or the link is already open this is a no-op that reports the
    /// current state (`true` only if open); no second connection is made.
    pub async fn connect(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        let claimed = inner.state.send_if_modified(|state| {
            if state.can_connect() {
                *state = LinkState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            let state = self.state();
            debug!(board = %inner.role, %state, "already connecting or connected");
            return state == LinkState::Open;
        }

        // Resets the state if this future is dropped mid-attempt.
        let mut guard = AttemptGuard {
            inner: inner.as_ref(),
            armed: true,
        };

        let abort = CancellationToken::new();
        inner.pending_attempt.store(Some(Arc::new(abort.clone())));

        let url = match inner.endpoint.load().url() {
            Ok(url) => url,
            Err(e) => {
                warn!(board = %inner.role, error = %e, "invalid endpoint");
                guard.disarm();
                inner.pending_attempt.store(None);
                inner.fail(Some(e.to_string()), false);
                return false;
            }
        };

        info!(board = %inner.role, url = %url, "connecting");

        let outcome = tokio::select! {
            biased;
            () = abort.cancelled() => Attempt::Aborted,
            dialed = tokio::time::timeout(timeout, inner.dialer.dial(url)) => match dialed {
                Ok(Ok(halves)) => Attempt::Connected(halves),
                Ok(Err(e)) => Attempt::Failed(e),
                Err(_) => Attempt::Failed(Error::ConnectTimeout {
                    board: inner.role,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            },
        };

        inner.pending_attempt.store(None);
        guard.disarm();

        match outcome {
            Attempt::Connected((sink, stream)) => {
                self.open(sink, stream);
                true
            }
            Attempt::Failed(e @ Error::ConnectTimeout { .. }) => {
                // Dropping the dial future released the half-open socket.
                warn!(board = %inner.role, error = %e, "connection timed out");
                inner.fail(None, false);
                false
            }
            Attempt::Failed(e) => {
                warn!(board = %inner.role, error = %e, "connection failed");
                inner.fail(Some(e.to_string()), false);
                false
            }
            Attempt::Aborted => {
                debug!(board = %inner.role, "connection attempt aborted");
                inner.fail(None, true);
                false
            }
        }
    }

    fn open(&self, sink: FrameSink, stream: FrameStream) {
        let inner = &self.inner;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        inner.outbound.store(Some(Arc::new(tx)));
        inner.last_open.store(Some(Arc::new(Utc::now())));
        inner.state.send_replace(LinkState::Open);
        let _ = inner.signals.send(LinkSignal::Opened);
        info!(board = %inner.role, "connected");

        let task = tokio::spawn(run_session(
            Arc::clone(inner),
            sink,
            stream,
            rx,
            cancel.clone(),
        ));

        let previous = inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Session { cancel, task });
        if let Some(stale) = previous {
            // Only a finished session can still be parked here.
            stale.cancel.cancel();
        }
    }

    // ── Send ─────────────────────────────────────────────────────────

    /// Serialize `message` and queue it on the open connection.
    ///
    /// Returns `false` (and logs) when the link is not open or the message
    /// cannot be serialized. Never panics, never errors.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        let role = self.inner.role;
        if !self.is_open() {
            warn!(board = %role, "not connected, message dropped");
            return false;
        }
        let Some(tx) = self.inner.outbound.load_full() else {
            warn!(board = %role, "not connected, message dropped");
            return false;
        };
        let text = match frame::encode(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(board = %role, error = %e, "unserializable message dropped");
                return false;
            }
        };
        if tx.send(text).is_err() {
            warn!(board = %role, "connection closing, message dropped");
            return false;
        }
        debug!(board = %role, "message queued");
        true
    }

    // ── Close ────────────────────────────────────────────────────────

    /// Close the link and wait until the connection resource is released.
    ///
    /// Aborts an in-flight attempt, tears down an open session, and leaves
    /// the link in `Closed`. Safe to call in any state.
    pub async fn close(&self) {
        let inner = &self.inner;

        if let Some(abort) = inner.pending_attempt.load_full() {
            abort.cancel();
            let mut rx = inner.state.subscribe();
            let settled = tokio::time::timeout(
                ABORT_SETTLE,
                rx.wait_for(|s| *s != LinkState::Connecting),
            )
            .await;
            if settled.is_err() {
                warn!(board = %inner.role, "aborted attempt did not settle, forcing closed");
            }
        }

        let session = inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(session) = session {
            inner.state.send_if_modified(|s| {
                if *s == LinkState::Open {
                    *s = LinkState::Closing;
                    true
                } else {
                    false
                }
            });
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                warn!(board = %inner.role, error = %e, "session task ended abnormally");
            }
        }

        inner.outbound.store(None);
        inner.state.send_if_modified(|s| {
            if *s == LinkState::Closed {
                false
            } else {
                *s = LinkState::Closed;
                true
            }
        });
        debug!(board = %inner.role, "closed");
    }

    /// Cancel any in-flight attempt or open session without waiting for the
    /// release. For teardown paths that cannot await.
    pub fn abort(&self) {
        if let Some(abort) = self.inner.pending_attempt.load_full() {
            abort.cancel();
        }
        if let Some(session) = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            session.cancel.cancel();
        }
    }
}

impl fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportLink")
            .field("role", &self.inner.role)
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LinkInner {
    /// Settle a failed or aborted attempt into `Closed` and report it.
    fn fail(&self, error: Option<String>, requested: bool) {
        self.state.send_replace(LinkState::Closed);
        if let Some(error) = error {
            let _ = self.signals.send(LinkSignal::Error(error));
        }
        let _ = self.signals.send(LinkSignal::Closed { requested });
    }
}

enum Attempt {
    Connected((FrameSink, FrameStream)),
    Failed(Error),
    Aborted,
}

/// Puts the link back into `Closed` if a connect future is dropped while
/// still dialing (e.g. its scheduled reconnect task was cancelled).
struct AttemptGuard<'a> {
    inner: &'a LinkInner,
    armed: bool,
}

impl AttemptGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.pending_attempt.store(None);
            self.inner.fail(None, true);
        }
    }
}

// ── Session lifecycle ────────────────────────────────────────────────

/// Pump one open connection until it ends, then release it.
///
/// Owns both halves; whichever way the loop exits (requested close, write
/// error, read error, peer close) the halves are dropped here and the link
/// returns to `Closed`.
async fn run_session(
    inner: Arc<LinkInner>,
    mut sink: FrameSink,
    mut stream: FrameStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let role = inner.role;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Frames queued before the close request still go out.
                let flush = async {
                    while let Ok(text) = outbound.try_recv() {
                        if sink.send(text).await.is_err() {
                            break;
                        }
                    }
                    let _ = sink.close().await;
                };
                let _ = tokio::time::timeout(CLOSE_GRACE, flush).await;
                break;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = sink.send(text).await {
                    warn!(board = %role, error = %e, "write failed");
                    let _ = inner.signals.send(LinkSignal::Error(e.to_string()));
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(text)) => match frame::parse(&text) {
                    Ok(value) => {
                        let _ = inner.signals.send(LinkSignal::Frame(value));
                    }
                    Err(e) => {
                        warn!(board = %role, error = %e, "malformed frame dropped");
                    }
                },
                Some(Err(e)) => {
                    warn!(board = %role, error = %e, "read failed");
                    let _ = inner.signals.send(LinkSignal::Error(e.to_string()));
                    break;
                }
                None => {
                    info!(board = %role, "connection closed by board");
                    break;
                }
            },
        }
    }

    drop(sink);
    drop(stream);
    inner.outbound.store(None);
    inner.state.send_replace(LinkState::Closed);
    let _ = inner.signals.send(LinkSignal::Closed {
        requested: cancel.is_cancelled(),
    });
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::channel::mpsc as fmpsc;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;

    use super::*;

    /// Board-side ends of an in-memory connection.
    struct Peer {
        to_client: fmpsc::UnboundedSender<Result<String, Error>>,
        from_client: fmpsc::UnboundedReceiver<String>,
    }

    #[derive(Default)]
    struct MemoryDialer {
        dials: AtomicUsize,
        peers: Mutex<Vec<Peer>>,
        hang: bool,
        refuse: bool,
    }

    impl Dialer for MemoryDialer {
        fn dial(&self, _url: Url) -> BoxFuture<'static, Result<(FrameSink, FrameStream), Error>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                return futures::future::pending().boxed();
            }
            if self.refuse {
                return async { Err(Error::WebSocketConnect("refused".into())) }.boxed();
            }
            let (to_client, client_rx) = fmpsc::unbounded();
            let (client_tx, from_client) = fmpsc::unbounded::<String>();
            self.peers.lock().unwrap().push(Peer {
                to_client,
                from_client,
            });
            let sink: FrameSink =
                Box::pin(client_tx.sink_map_err(|e| Error::WebSocketConnect(e.to_string())));
            let stream: FrameStream = Box::pin(client_rx);
            async move { Ok((sink, stream)) }.boxed()
        }
    }

    fn link_with(
        dialer: Arc<MemoryDialer>,
    ) -> (TransportLink, mpsc::UnboundedReceiver<LinkSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = TransportLink::new(
            BoardRole::Main,
            Endpoint::new("127.0.0.1", 80, "/ws"),
            dialer,
            tx,
        );
        (link, rx)
    }

    #[test]
    fn endpoint_url_adds_leading_slash() {
        let ep = Endpoint::new("192.168.8.100", 80, "ws");
        assert_eq!(ep.url().unwrap().as_str(), "ws://192.168.8.100/ws");
        let ep = Endpoint::new("10.0.0.2", 8080, "/ws");
        assert_eq!(ep.url().unwrap().as_str(), "ws://10.0.0.2:8080/ws");
    }

    #[test]
    fn board_role_names() {
        assert_eq!(BoardRole::Main.to_string(), "main");
        assert_eq!("camera".parse::<BoardRole>().unwrap(), BoardRole::Camera);
    }

    #[tokio::test]
    async fn connect_opens_and_signals() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, mut rx) = link_with(Arc::clone(&dialer));

        assert_eq!(link.state(), LinkState::Idle);
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(link.state(), LinkState::Open);
        assert!(link.last_open().is_some());
        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Opened);
    }

    #[tokio::test]
    async fn connect_while_open_is_a_noop() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, _rx) = link_with(Arc::clone(&dialer));

        assert!(link.connect(Duration::from_secs(5)).await);
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_connecting_is_a_noop() {
        let dialer = Arc::new(MemoryDialer {
            hang: true,
            ..MemoryDialer::default()
        });
        let (link, _rx) = link_with(Arc::clone(&dialer));

        let first = {
            let link = link.clone();
            tokio::spawn(async move { link.connect(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(link.state(), LinkState::Connecting);

        assert!(!link.connect(Duration::from_secs(5)).await);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 1);

        assert!(!first.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_times_out_and_closes() {
        let dialer = Arc::new(MemoryDialer {
            hang: true,
            ..MemoryDialer::default()
        });
        let (link, mut rx) = link_with(dialer);

        assert!(!link.connect(Duration::from_secs(5)).await);
        assert_eq!(link.state(), LinkState::Closed);
        assert_eq!(
            rx.recv().await.unwrap(),
            LinkSignal::Closed { requested: false }
        );
    }

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        let dialer = Arc::new(MemoryDialer {
            refuse: true,
            ..MemoryDialer::default()
        });
        let (link, mut rx) = link_with(dialer);

        assert!(!link.connect(Duration::from_secs(5)).await);
        assert!(matches!(rx.recv().await.unwrap(), LinkSignal::Error(_)));
        assert_eq!(
            rx.recv().await.unwrap(),
            LinkSignal::Closed { requested: false }
        );
    }

    #[tokio::test]
    async fn send_requires_open_link() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, _rx) = link_with(Arc::clone(&dialer));

        assert!(!link.send(&json!({"action": "play_audio"})));

        assert!(link.connect(Duration::from_secs(5)).await);
        assert!(link.send(&json!({"action": "play_audio"})));

        let mut peer = dialer.peers.lock().unwrap().pop().unwrap();
        let text = peer.from_client.next().await.unwrap();
        assert_eq!(frame::parse(&text).unwrap()["action"], "play_audio");
    }

    #[tokio::test]
    async fn inbound_frames_keep_order_and_skip_malformed() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, mut rx) = link_with(Arc::clone(&dialer));
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Opened);

        let peer = dialer.peers.lock().unwrap().pop().unwrap();
        peer.to_client.unbounded_send(Ok(r#"{"seq":1}"#.into())).unwrap();
        peer.to_client.unbounded_send(Ok("garbage".into())).unwrap();
        peer.to_client.unbounded_send(Ok(r#"{"seq":2}"#.into())).unwrap();

        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Frame(json!({"seq": 1})));
        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Frame(json!({"seq": 2})));
    }

    #[tokio::test]
    async fn remote_close_returns_to_closed() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, mut rx) = link_with(Arc::clone(&dialer));
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Opened);

        drop(dialer.peers.lock().unwrap().pop());

        assert_eq!(
            rx.recv().await.unwrap(),
            LinkSignal::Closed { requested: false }
        );
        assert_eq!(link.state(), LinkState::Closed);
        assert!(!link.send(&json!({})));
    }

    #[tokio::test]
    async fn frames_queued_before_close_are_flushed() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, _rx) = link_with(Arc::clone(&dialer));
        assert!(link.connect(Duration::from_secs(5)).await);

        assert!(link.send(&json!({"seq": 1})));
        assert!(link.send(&json!({"seq": 2})));
        link.close().await;

        let peer = dialer.peers.lock().unwrap().pop().unwrap();
        let sent: Vec<String> = peer.from_client.collect().await;
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn explicit_close_is_marked_requested() {
        let dialer = Arc::new(MemoryDialer::default());
        let (link, mut rx) = link_with(Arc::clone(&dialer));
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(rx.recv().await.unwrap(), LinkSignal::Opened);

        link.close().await;

        assert_eq!(link.state(), LinkState::Closed);
        assert_eq!(
            rx.recv().await.unwrap(),
            LinkSignal::Closed { requested: true }
        );

        // Reconnect works after an explicit close.
        assert!(link.connect(Duration::from_secs(5)).await);
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_aborts_in_flight_attempt() {
        let dialer = Arc::new(MemoryDialer {
            hang: true,
            ..MemoryDialer::default()
        });
        let (link, mut rx) = link_with(dialer);

        let attempt = {
            let link = link.clone();
            tokio::spawn(async move { link.connect(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        link.close().await;
        assert!(!attempt.await.unwrap());
        assert_eq!(link.state(), LinkState::Closed);
        assert_eq!(
            rx.recv().await.unwrap(),
            LinkSignal::Closed { requested: true }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_attempt_resets_state() {
        let dialer = Arc::new(MemoryDialer {
            hang: true,
            ..MemoryDialer::default()
        });
        let (link, _rx) = link_with(dialer);

        let attempt = {
            let link = link.clone();
            tokio::spawn(async move { link.connect(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(link.state(), LinkState::Connecting);

        attempt.abort();
        let _ = attempt.await;
        assert_eq!(link.state(), LinkState::Closed);
    }
}
