// ── Connection supervisor ──
//
// Owns the main and camera links. Each link's lifecycle signals are
// consumed by a dedicated driver task, which keeps per-link ordering and
// turns them into bus events, reconnect scheduling and fallback
// declarations. The two links never gate each other.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bantay_api::{
    BoardRole, CloudBackend, Dialer, Endpoint, LinkSignal, LinkState, TransportLink,
    WebSocketDialer, frame,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, EventStream, HandlerError, Subscription};
use crate::config::{CameraEventClass, CloudConfig, SupervisorConfig};
use crate::event::{EventKind, SupervisorEvent};
use crate::schedule::{ScheduledTask, TaskSlot};

// ── Snapshots ────────────────────────────────────────────────────────

/// Point-in-time connection summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub main: bool,
    pub camera: bool,
    pub fully_connected: bool,
}

/// Current endpoints of both links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoints {
    pub main: Endpoint,
    pub camera: Endpoint,
}

/// Cloud relay wiring: the backend plus its polling parameters.
#[derive(Clone)]
pub struct CloudLink {
    pub backend: Arc<dyn CloudBackend>,
    pub config: CloudConfig,
}

impl fmt::Debug for CloudLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ── ConnectionSupervisor ─────────────────────────────────────────────

/// Supervises both board links. Cheaply cloneable.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    config: SupervisorConfig,
    main: LinkSlot,
    camera: LinkSlot,
    bus: EventBus<SupervisorEvent>,
    cloud: Option<CloudLink>,
    cloud_poll: TaskSlot,
    /// Set by `disconnect_all`, cleared by `connect_all`. Blocks reconnect scheduling.
    stopped: AtomicBool,
    cancel: CancellationToken,
    pending_signals: Mutex<Option<[(BoardRole, mpsc::UnboundedReceiver<LinkSignal>); 2]>>,
    drivers: Mutex<Vec<JoinHandle<()>>>,
}

struct LinkSlot {
    link: TransportLink,
    attempts: AtomicU32,
    fallback: AtomicBool,
    reconnect: TaskSlot,
}

impl LinkSlot {
    fn new(
        role: BoardRole,
        endpoint: Endpoint,
        dialer: Arc<dyn Dialer>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = Self {
            link: TransportLink::new(role, endpoint, dialer, tx),
            attempts: AtomicU32::new(0),
            fallback: AtomicBool::new(false),
            reconnect: TaskSlot::new(),
        };
        (slot, rx)
    }
}

impl ConnectionSupervisor {
    /// Supervisor dialing real WebSocket endpoints, without a cloud relay.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_dialer(config, Arc::new(WebSocketDialer), None)
    }

    /// Build with an explicit dialer and optional cloud relay. Does NOT
    /// connect; call [`connect_all()`](Self::connect_all).
    pub fn with_dialer(
        config: SupervisorConfig,
        dialer: Arc<dyn Dialer>,
        cloud: Option<CloudLink>,
    ) -> Self {
        let (main, main_rx) = LinkSlot::new(
            BoardRole::Main,
            config.main.clone(),
            Arc::clone(&dialer),
        );
        let (camera, camera_rx) = LinkSlot::new(BoardRole::Camera, config.camera.clone(), dialer);

        Self {
            inner: Arc::new(SupervisorInner {
                config,
                main,
                camera,
                bus: EventBus::new(),
                cloud,
                cloud_poll: TaskSlot::new(),
                stopped: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                pending_signals: Mutex::new(Some([
                    (BoardRole::Main, main_rx),
                    (BoardRole::Camera, camera_rx),
                ])),
                drivers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn bus(&self) -> &EventBus<SupervisorEvent> {
        &self.inner.bus
    }

    /// Register a synchronous handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription<EventKind>
    where
        F: Fn(&SupervisorEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, subscription: &Subscription<EventKind>) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }

    /// Every event published from now on, as an async stream.
    pub fn events(&self) -> EventStream<SupervisorEvent> {
        self.inner.bus.stream()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect both links concurrently. One failing never blocks the other;
    /// failures schedule reconnects.
    pub async fn connect_all(&self) -> ConnectionStatus {
        self.ensure_drivers();
        let inner = &self.inner;
        inner.stopped.store(false, Ordering::SeqCst);

        // A link already connecting (e.g. a due reconnect) is left to finish.
        let timeout = inner.config.connect_timeout;
        let (main, camera) = tokio::join!(
            inner.main.link.connect(timeout),
            inner.camera.link.connect(timeout),
        );
        debug!(main, camera, "connect_all finished");
        self.connection_status()
    }

    /// Close both links and cancel every pending timer, including a
    /// reconnect that is mid-attempt.
    pub async fn disconnect_all(&self) {
        let inner = &self.inner;
        inner.stopped.store(true, Ordering::SeqCst);

        inner.main.reconnect.cancel();
        inner.camera.reconnect.cancel();
        inner.cloud_poll.cancel();

        tokio::join!(inner.main.link.close(), inner.camera.link.close());

        inner.bus.publish(SupervisorEvent::Disconnected);
        info!("disconnected from both boards");
    }

    /// Clear both reconnect counters and fallback flags. Auto-reconnect
    /// resumes with the next unrequested close.
    pub fn reset_reconnection_attempts(&self) {
        let inner = &self.inner;
        for slot in [&inner.main, &inner.camera] {
            slot.attempts.store(0, Ordering::SeqCst);
            slot.fallback.store(false, Ordering::SeqCst);
        }
        inner.cloud_poll.cancel();
        info!("reconnection attempts reset");
    }

    // ── Sending ──────────────────────────────────────────────────────

    pub fn send_to_main<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        self.inner.main.link.send(message)
    }

    pub fn send_to_camera<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        self.inner.camera.link.send(message)
    }

    pub fn send_to<T: Serialize + ?Sized>(&self, role: BoardRole, message: &T) -> bool {
        self.inner.slot(role).link.send(message)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_fully_connected(&self) -> bool {
        self.inner.is_fully_connected()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let main = self.inner.main.link.is_open();
        let camera = self.inner.camera.link.is_open();
        ConnectionStatus {
            main,
            camera,
            fully_connected: main && camera,
        }
    }

    pub fn link_state(&self, role: BoardRole) -> LinkState {
        self.inner.slot(role).link.state()
    }

    pub fn last_open(&self, role: BoardRole) -> Option<DateTime<Utc>> {
        self.inner.slot(role).link.last_open()
    }

    pub fn reconnect_attempts(&self, role: BoardRole) -> u32 {
        self.inner.slot(role).attempts.load(Ordering::SeqCst)
    }

    pub fn is_in_fallback(&self, role: BoardRole) -> bool {
        self.inner.slot(role).fallback.load(Ordering::SeqCst)
    }

    pub fn has_cloud(&self) -> bool {
        self.inner.cloud.is_some()
    }

    pub fn cloud(&self) -> Option<&CloudLink> {
        self.inner.cloud.as_ref()
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Point a link at a new endpoint. Used from the next connect attempt.
    pub fn set_endpoint(&self, role: BoardRole, endpoint: Endpoint) {
        self.inner.slot(role).link.set_endpoint(endpoint);
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            main: self.inner.main.link.endpoint(),
            camera: self.inner.camera.link.endpoint(),
        }
    }

    // ── Driver tasks ─────────────────────────────────────────────────

    /// Spawn the per-link signal drivers on first use.
    fn ensure_drivers(&self) {
        let Some(receivers) = self
            .inner
            .pending_signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let mut drivers = self
            .inner
            .drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (role, rx) in receivers {
            drivers.push(tokio::spawn(drive_link(
                Arc::downgrade(&self.inner),
                role,
                rx,
                self.inner.cancel.clone(),
            )));
        }
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("main", &self.inner.main.link)
            .field("camera", &self.inner.camera.link)
            .finish_non_exhaustive()
    }
}

/// Consume one link's signals in order until the supervisor goes away.
async fn drive_link(
    inner: Weak<SupervisorInner>,
    role: BoardRole,
    mut rx: mpsc::UnboundedReceiver<LinkSignal>,
    cancel: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            signal = rx.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.on_signal(role, signal);
    }
    debug!(board = %role, "link driver exiting");
}

// ── Signal handling ──────────────────────────────────────────────────

impl SupervisorInner {
    fn slot(&self, role: BoardRole) -> &LinkSlot {
        match role {
            BoardRole::Main => &self.main,
            BoardRole::Camera => &self.camera,
        }
    }

    fn is_fully_connected(&self) -> bool {
        self.main.link.is_open() && self.camera.link.is_open()
    }

    fn on_signal(self: &Arc<Self>, role: BoardRole, signal: LinkSignal) {
        match signal {
            LinkSignal::Opened => self.on_opened(role),
            LinkSignal::Frame(value) => self.on_frame(role, value),
            LinkSignal::Error(error) => {
                self.bus.publish(SupervisorEvent::Error {
                    source: role,
                    error,
                });
            }
            LinkSignal::Closed { requested } => self.on_closed(role, requested),
        }
    }

    fn on_opened(&self, role: BoardRole) {
        let slot = self.slot(role);
        slot.attempts.store(0, Ordering::SeqCst);
        slot.fallback.store(false, Ordering::SeqCst);
        slot.reconnect.cancel();
        if role == BoardRole::Main && self.cloud_poll.cancel() {
            info!("main board back online, cloud relay stopped");
        }

        self.bus
            .publish(SupervisorEvent::link_connected(role, true));
        self.bus
            .publish(SupervisorEvent::Connected(self.is_fully_connected()));
    }

    fn on_frame(&self, role: BoardRole, value: Value) {
        match role {
            BoardRole::Main => self.bus.publish(SupervisorEvent::MainData(value)),
            BoardRole::Camera => {
                let class = frame::discriminator(&value)
                    .and_then(|t| self.config.camera_discriminators.get(t))
                    .copied();
                match class {
                    Some(class) => {
                        self.bus.publish(SupervisorEvent::CameraData(value.clone()));
                        self.bus.publish(match class {
                            CameraEventClass::Alert => SupervisorEvent::Alert(value),
                            CameraEventClass::Status => SupervisorEvent::CameraStatus(value),
                        });
                    }
                    None => self.bus.publish(SupervisorEvent::CameraData(value)),
                }
            }
        }
    }

    fn on_closed(self: &Arc<Self>, role: BoardRole, requested: bool) {
        self.bus
            .publish(SupervisorEvent::link_connected(role, false));
        self.bus
            .publish(SupervisorEvent::Connected(self.is_fully_connected()));

        if requested || self.stopped.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
            return;
        }
        self.schedule_reconnect(role);
    }

    /// Schedule the next reconnect, or declare fallback once the budget is spent.
    fn schedule_reconnect(self: &Arc<Self>, role: BoardRole) {
        let slot = self.slot(role);
        let max = self.config.max_reconnect_attempts;

        if slot.attempts.load(Ordering::SeqCst) >= max {
            if !slot.fallback.swap(true, Ordering::SeqCst) {
                warn!(board = %role, max, "reconnect budget exhausted, falling back to cloud");
                self.bus.publish(SupervisorEvent::Fallback { board: role });
                if role == BoardRole::Main {
                    self.start_cloud_relay();
                }
            }
            return;
        }

        let attempt = slot.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.config.reconnect_interval;
        info!(board = %role, attempt, max, delay_ms = delay.as_millis(), "scheduling reconnect");

        let link = slot.link.clone();
        let timeout = self.config.connect_timeout;
        slot.reconnect.replace(ScheduledTask::after_in(&self.cancel, delay, async move {
            link.connect(timeout).await;
        }));

        // Lost a race with disconnect_all.
        if self.stopped.load(Ordering::SeqCst) {
            slot.reconnect.cancel();
        }
    }

    /// Relay the main board's cloud telemetry while its local link is down.
    fn start_cloud_relay(self: &Arc<Self>) {
        let Some(cloud) = self.cloud.clone() else {
            debug!("no cloud backend configured, relay not started");
            return;
        };
        let weak = Arc::downgrade(self);
        let device_id = cloud.config.main_device_id.clone();
        let interval = cloud.config.poll_interval;

        info!(device_id = %device_id, "starting cloud telemetry relay");
        self.cloud_poll.replace(ScheduledTask::after_in(
            &self.cancel,
            Duration::ZERO,
            relay_cloud_telemetry(weak, cloud.backend, device_id, interval),
        ));
    }
}

impl Drop for SupervisorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.main.link.abort();
        self.camera.link.abort();
    }
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll the latest telemetry document and republish changes as `main_data`.
async fn relay_cloud_telemetry(
    inner: Weak<SupervisorInner>,
    backend: Arc<dyn CloudBackend>,
    device_id: String,
    interval: Duration,
) {
    let mut last: Option<Value> = None;
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match backend.latest_telemetry(&device_id).await {
            Ok(Some(doc)) => {
                if last.as_ref() == Some(&doc) {
                    continue;
                }
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                debug!(device_id = %device_id, "cloud telemetry received");
                inner.bus.publish(SupervisorEvent::MainData(doc.clone()));
                last = Some(doc);
            }
            Ok(None) => debug!(device_id = %device_id, "no cloud telemetry yet"),
            Err(e) => warn!(device_id = %device_id, error = %e, "cloud telemetry poll failed"),
        }
    }
}
