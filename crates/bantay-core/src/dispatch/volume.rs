// ── Debounced volume control ──
//
// The local value changes immediately on every `set_value`; the board
// only hears about it once the slider has been quiet for the debounce
// period. Remote status reports are applied unless they are the echo of
// our own last send or a user edit is still pending.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::command::Command;
use super::convert::{APP_MAX, app_to_hardware, hardware_to_app};
use super::dispatcher::CommandSink;
use crate::bus::Subscription;
use crate::config::VolumeConfig;
use crate::error::CoreError;
use crate::event::{EventKind, SupervisorEvent};
use crate::schedule::{ScheduledTask, TaskSlot};
use crate::supervisor::ConnectionSupervisor;

const ERROR_CHANNEL_SIZE: usize = 16;

/// A deferred send that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeError {
    /// App-scale value that was being sent.
    pub value: u8,
    pub message: String,
}

#[derive(Clone)]
pub struct VolumeControl {
    inner: Arc<VolumeInner>,
}

struct VolumeInner {
    config: VolumeConfig,
    sink: Arc<dyn CommandSink>,
    value: watch::Sender<u8>,
    pending: TaskSlot,
    last_sent: Mutex<Option<Sent>>,
    errors: broadcast::Sender<VolumeError>,
}

#[derive(Debug, Clone, Copy)]
struct Sent {
    value: u8,
    at: Instant,
}

impl VolumeControl {
    pub fn new(config: VolumeConfig, sink: Arc<dyn CommandSink>) -> Self {
        let (value, _) = watch::channel(config.initial.min(APP_MAX));
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_SIZE);
        Self {
            inner: Arc::new(VolumeInner {
                config,
                sink,
                value,
                pending: TaskSlot::new(),
                last_sent: Mutex::new(None),
                errors,
            }),
        }
    }

    /// Current app-scale value (0–100).
    pub fn value(&self) -> u8 {
        *self.inner.value.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u8> {
        self.inner.value.subscribe()
    }

    /// Failures of debounced sends.
    pub fn errors(&self) -> broadcast::Receiver<VolumeError> {
        self.inner.errors.subscribe()
    }

    /// Last value handed to the sink, app scale.
    pub fn last_sent(&self) -> Option<u8> {
        self.inner.last_sent().map(|s| s.value)
    }

    pub fn has_pending_send(&self) -> bool {
        self.inner.pending.is_pending()
    }

    /// Clamp and store `value` now; send it once input has been quiet for
    /// the debounce period. Returns the stored value.
    pub fn set_value(&self, value: i32) -> u8 {
        let clamped = u8::try_from(value.clamp(0, i32::from(APP_MAX))).unwrap_or(APP_MAX);
        self.inner.value.send_replace(clamped);

        let weak = Arc::downgrade(&self.inner);
        self.inner.pending.replace(ScheduledTask::after(
            self.inner.config.debounce,
            debounced_send(weak),
        ));
        clamped
    }

    /// Send the current value immediately, superseding any pending send.
    pub async fn commit(&self) -> Result<(), CoreError> {
        self.inner.pending.cancel();
        self.inner.send_current().await
    }

    /// Apply an authoritative status from the board, in hardware units.
    ///
    /// Ignored while a local edit is waiting to be sent, and when it echoes
    /// the last sent value within the echo window. Returns `true` if the
    /// local value changed.
    pub fn apply_remote(&self, hardware: u8) -> bool {
        self.inner.apply_remote(hardware)
    }

    /// Track the `volume` the main board reports in its telemetry, local or
    /// relayed from the cloud. Pass the returned subscription to
    /// [`ConnectionSupervisor::unsubscribe`] to stop following.
    pub fn follow(&self, supervisor: &ConnectionSupervisor) -> Subscription<EventKind> {
        let weak = Arc::downgrade(&self.inner);
        supervisor.subscribe(EventKind::MainData, move |event| {
            let SupervisorEvent::MainData(sample) = event else {
                return Ok(());
            };
            if let (Some(hardware), Some(inner)) = (reported_volume(sample), weak.upgrade()) {
                inner.apply_remote(hardware);
            }
            Ok(())
        })
    }
}

/// Hardware-scale `volume` field of a telemetry sample.
fn reported_volume(sample: &Value) -> Option<u8> {
    let raw = sample.get("volume")?.as_u64()?;
    Some(u8::try_from(raw).unwrap_or(u8::MAX))
}

impl std::fmt::Debug for VolumeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeControl")
            .field("value", &self.value())
            .field("last_sent", &self.last_sent())
            .finish_non_exhaustive()
    }
}

impl VolumeInner {
    fn apply_remote(&self, hardware: u8) -> bool {
        let remote = hardware_to_app(hardware);

        if self.pending.is_pending() {
            debug!(remote, "remote volume ignored, local edit pending");
            return false;
        }
        if let Some(sent) = self.last_sent() {
            if sent.value == remote && sent.at.elapsed() <= self.config.echo_window {
                debug!(remote, "remote volume is an echo");
                return false;
            }
        }

        self.value.send_if_modified(|v| {
            if *v == remote {
                false
            } else {
                *v = remote;
                true
            }
        })
    }

    fn last_sent(&self) -> Option<Sent> {
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send_current(&self) -> Result<(), CoreError> {
        let value = *self.value.borrow();
        let hardware = app_to_hardware(value);

        // Recorded before the send so a fast echo is recognized.
        *self.last_sent.lock().unwrap_or_else(PoisonError::into_inner) = Some(Sent {
            value,
            at: Instant::now(),
        });

        let delivery = self
            .sink
            .dispatch(Command::SetVolume, json!({ "volume": hardware }))
            .await?;
        debug!(value, hardware, ?delivery, "volume sent");
        Ok(())
    }
}

async fn debounced_send(inner: Weak<VolumeInner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if let Err(e) = inner.send_current().await {
        let value = *inner.value.borrow();
        warn!(value, error = %e, "volume send failed");
        let _ = inner.errors.send(VolumeError {
            value,
            message: e.to_string(),
        });
    }
}
