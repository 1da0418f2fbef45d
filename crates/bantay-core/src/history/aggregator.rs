// ── History aggregator ──
//
// Classifies main-board telemetry into motion and environmental entries,
// keeps both newest-first logs in memory and mirrors every change to
// durable storage. Storage faults are logged and degrade the operation;
// they never propagate to whoever published the sample.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Local;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{self, EnvEntry, MotionEntry};
use super::export::{ExportSink, HistoryExport, export_file_name};
use super::log::{BoundedLog, PeriodicGate};
use super::stats::{self, MotionStats, RecentEnvEntry};
use super::storage::{ENV_KEY, HistoryStorage, MOTION_KEY};
use crate::bus::{BusEvent, EventBus, HandlerError, Subscription};
use crate::config::HistoryConfig;
use crate::event::{EventKind, SupervisorEvent};
use crate::supervisor::ConnectionSupervisor;

// ── Notifications ────────────────────────────────────────────────────

/// Which log changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryChange {
    Motion,
    Env,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum HistoryTopic {
    Update,
}

/// Fired after every append and every clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryUpdate {
    pub change: HistoryChange,
}

impl BusEvent for HistoryUpdate {
    type Tag = HistoryTopic;

    fn tag(&self) -> HistoryTopic {
        HistoryTopic::Update
    }
}

// ── HistoryAggregator ────────────────────────────────────────────────

/// Single writer of the motion and environmental logs. Cheaply cloneable.
#[derive(Clone)]
pub struct HistoryAggregator {
    inner: Arc<AggregatorInner>,
}

struct AggregatorInner {
    storage: Arc<dyn HistoryStorage>,
    clock: Arc<dyn Clock>,
    state: Mutex<HistoryState>,
    bus: EventBus<HistoryUpdate>,
    attachment: Mutex<Option<Attachment>>,
}

struct HistoryState {
    motion: BoundedLog<MotionEntry>,
    env: BoundedLog<EnvEntry>,
    env_gate: PeriodicGate,
}

struct Attachment {
    supervisor: ConnectionSupervisor,
    subscription: Subscription<EventKind>,
}

impl HistoryAggregator {
    /// Open the logs from `storage` using the system clock.
    pub fn open(config: HistoryConfig, storage: Arc<dyn HistoryStorage>) -> Self {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Open the logs with an explicit clock. Unreadable or corrupt stored
    /// logs are logged and start empty.
    pub fn with_clock(
        config: HistoryConfig,
        storage: Arc<dyn HistoryStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let motion = load_log(storage.as_ref(), MOTION_KEY, config.max_entries);
        let env = load_log(storage.as_ref(), ENV_KEY, config.max_entries);
        debug!(
            motion = motion.len(),
            env = env.len(),
            "history loaded"
        );

        Self {
            inner: Arc::new(AggregatorInner {
                storage,
                clock,
                state: Mutex::new(HistoryState {
                    motion,
                    env,
                    env_gate: PeriodicGate::new(config.env_interval),
                }),
                bus: EventBus::new(),
                attachment: Mutex::new(None),
            }),
        }
    }

    // ── Supervisor attachment ────────────────────────────────────────

    /// Start consuming `main_data` from `supervisor`. Each sample is
    /// processed synchronously inside the supervisor's publish. Calling
    /// again while attached is a no-op.
    pub fn start(&self, supervisor: &ConnectionSupervisor) {
        let mut attachment = self.inner.attachment();
        if attachment.is_some() {
            debug!("history aggregator already started");
            return;
        }

        let weak: Weak<AggregatorInner> = Arc::downgrade(&self.inner);
        let subscription = supervisor.subscribe(EventKind::MainData, move |event| {
            if let (SupervisorEvent::MainData(sample), Some(inner)) = (event, weak.upgrade()) {
                inner.on_data(sample);
            }
            Ok(())
        });

        *attachment = Some(Attachment {
            supervisor: supervisor.clone(),
            subscription,
        });
        info!("history aggregator started");
    }

    /// Detach from the supervisor. Safe to call when not started.
    pub fn stop(&self) {
        if let Some(Attachment {
            supervisor,
            subscription,
        }) = self.inner.attachment().take()
        {
            supervisor.unsubscribe(&subscription);
            info!("history aggregator stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.attachment().is_some()
    }

    // ── Ingest ───────────────────────────────────────────────────────

    /// Process one telemetry sample.
    pub fn on_data(&self, sample: &Value) {
        self.inner.on_data(sample);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn motion_history(&self) -> Vec<MotionEntry> {
        self.inner.state().motion.snapshot()
    }

    pub fn env_history(&self) -> Vec<EnvEntry> {
        self.inner.state().env.snapshot()
    }

    /// Environmental entries from the last `hours`, with local display times.
    pub fn recent_env_history(&self, hours: u32) -> Vec<RecentEnvEntry> {
        let now = self.inner.clock.now().with_timezone(&Local);
        stats::recent_env(&self.env_history(), &now, hours)
    }

    /// Motion counts for the local calendar day.
    pub fn today_motion_stats(&self) -> MotionStats {
        let now = self.inner.clock.now().with_timezone(&Local);
        stats::motion_stats(&self.motion_history(), &now)
    }

    // ── Export / clear ───────────────────────────────────────────────

    /// Build an export of both logs and hand it to `sink`. Returns the
    /// export, or `None` if delivery failed (logged).
    pub fn export_history(&self, sink: &dyn ExportSink) -> Option<HistoryExport> {
        let now = self.inner.clock.now();
        let export = {
            let state = self.inner.state();
            HistoryExport::build(state.motion.snapshot(), state.env.snapshot(), now)
        };
        let file_name = export_file_name(now.date_naive());

        match sink.deliver(&file_name, &export) {
            Ok(location) => {
                info!(
                    location = %location,
                    motion = export.summary.total_motion_events,
                    env = export.summary.total_env_samples,
                    "history exported"
                );
                Some(export)
            }
            Err(e) => {
                error!(error = %e, "history export failed");
                None
            }
        }
    }

    /// Remove both logs from storage and memory. On a storage fault nothing
    /// is cleared and `false` is returned.
    pub fn clear_all(&self) -> bool {
        let inner = &self.inner;
        {
            let mut state = inner.state();

            let saved_motion = inner.storage.read(MOTION_KEY).ok().flatten();
            if let Err(e) = inner.storage.remove(MOTION_KEY) {
                error!(error = %e, "failed to clear motion history");
                return false;
            }
            if let Err(e) = inner.storage.remove(ENV_KEY) {
                error!(error = %e, "failed to clear environmental history");
                if let Some(saved) = saved_motion {
                    if let Err(e) = inner.storage.write(MOTION_KEY, &saved) {
                        error!(error = %e, "failed to restore motion history");
                    }
                }
                return false;
            }

            state.motion.clear();
            state.env.clear();
        }

        info!("history cleared");
        inner.notify(HistoryChange::Cleared);
        true
    }

    // ── Subscribers ──────────────────────────────────────────────────

    /// Register an `update` handler.
    pub fn on<F>(&self, handler: F) -> Subscription<HistoryTopic>
    where
        F: Fn(&HistoryUpdate) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(HistoryTopic::Update, handler)
    }

    pub fn off(&self, subscription: &Subscription<HistoryTopic>) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }
}

impl std::fmt::Debug for HistoryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("HistoryAggregator")
            .field("motion", &state.motion.len())
            .field("env", &state.env.len())
            .finish_non_exhaustive()
    }
}

impl AggregatorInner {
    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attachment(&self) -> MutexGuard<'_, Option<Attachment>> {
        self.attachment.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_data(&self, sample: &Value) {
        let now = self.clock.now_ms();
        let mut changes = Vec::with_capacity(2);
        {
            let mut state = self.state();

            if entry::is_motion(sample) {
                state.motion.push(MotionEntry::from_sample(sample, now));
                self.persist(MOTION_KEY, &state.motion);
                changes.push(HistoryChange::Motion);
            }

            if state.env_gate.try_accept(now) {
                state.env.push(EnvEntry::from_sample(sample, now));
                self.persist(ENV_KEY, &state.env);
                changes.push(HistoryChange::Env);
            }
        }

        // Outside the lock: handlers may read the logs.
        for change in changes {
            self.notify(change);
        }
    }

    fn persist<T: Serialize + Clone>(&self, key: &str, log: &BoundedLog<T>) {
        let result = serde_json::to_string(&log.snapshot())
            .map_err(crate::CoreError::from)
            .and_then(|json| self.storage.write(key, &json));
        if let Err(e) = result {
            error!(key, error = %e, "failed to persist history");
        }
    }

    fn notify(&self, change: HistoryChange) {
        self.bus.publish(HistoryUpdate { change });
    }
}

fn load_log<T: DeserializeOwned + Clone>(
    storage: &dyn HistoryStorage,
    key: &str,
    capacity: usize,
) -> BoundedLog<T> {
    let entries = match storage.read(key) {
        Ok(Some(text)) => match serde_json::from_str::<Vec<T>>(&text) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key, error = %e, "stored history is corrupt, starting empty");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            error!(key, error = %e, "failed to read stored history");
            Vec::new()
        }
    };
    BoundedLog::from_entries(entries, capacity)
}
