// ── Supervisor events ──
//
// The unified status and data stream published by the connection
// supervisor. Tags match the names UI collaborators subscribe to.

use bantay_api::BoardRole;
use serde_json::{Value, json};

use crate::bus::BusEvent;

/// Event tag, one per [`SupervisorEvent`] variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    MainConnected,
    CameraConnected,
    Connected,
    MainData,
    CameraData,
    Alert,
    CameraStatus,
    Error,
    #[strum(serialize = "fallback_to_firebase")]
    Fallback,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    MainConnected(bool),
    CameraConnected(bool),
    /// Both links open.
    Connected(bool),
    MainData(Value),
    CameraData(Value),
    /// Camera frame classified as an alert (e.g. `bird_detection`).
    Alert(Value),
    /// Camera frame classified as a status report.
    CameraStatus(Value),
    Error { source: BoardRole, error: String },
    /// The board's reconnect budget is exhausted; use the cloud path.
    Fallback { board: BoardRole },
    Disconnected,
}

impl SupervisorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MainConnected(_) => EventKind::MainConnected,
            Self::CameraConnected(_) => EventKind::CameraConnected,
            Self::Connected(_) => EventKind::Connected,
            Self::MainData(_) => EventKind::MainData,
            Self::CameraData(_) => EventKind::CameraData,
            Self::Alert(_) => EventKind::Alert,
            Self::CameraStatus(_) => EventKind::CameraStatus,
            Self::Error { .. } => EventKind::Error,
            Self::Fallback { .. } => EventKind::Fallback,
            Self::Disconnected => EventKind::Disconnected,
        }
    }

    /// `main_connected` / `camera_connected` for `role`.
    pub fn link_connected(role: BoardRole, connected: bool) -> Self {
        match role {
            BoardRole::Main => Self::MainConnected(connected),
            BoardRole::Camera => Self::CameraConnected(connected),
        }
    }

    /// The event's payload as a JSON value.
    pub fn payload(&self) -> Value {
        match self {
            Self::MainConnected(b) | Self::CameraConnected(b) | Self::Connected(b) => json!(b),
            Self::MainData(v) | Self::CameraData(v) | Self::Alert(v) | Self::CameraStatus(v) => {
                v.clone()
            }
            Self::Error { source, error } => json!({ "source": source, "error": error }),
            Self::Fallback { board } => json!({ "board": board }),
            Self::Disconnected => json!(true),
        }
    }

    /// `{"event": tag, "payload": ...}`
    pub fn to_json(&self) -> Value {
        let tag: &'static str = self.kind().into();
        json!({ "event": tag, "payload": self.payload() })
    }
}

impl BusEvent for SupervisorEvent {
    type Tag = EventKind;

    fn tag(&self) -> EventKind {
        self.kind()
    }
}
