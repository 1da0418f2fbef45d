// ── Runtime configuration ──
//
// Plain values describing how the supervisor, aggregator and controls
// behave. Built by the composition root (CLI) from its config file; core
// never reads config files itself.

use std::collections::HashMap;
use std::time::Duration;

use bantay_api::Endpoint;
use serde::{Deserialize, Serialize};

/// Default main board endpoint.
pub const DEFAULT_MAIN_HOST: &str = "192.168.8.100";
/// Default camera board endpoint.
pub const DEFAULT_CAMERA_HOST: &str = "192.168.8.101";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_PATH: &str = "/ws";

/// Device ids the boards register under in the cloud store.
pub const MAIN_DEVICE_ID: &str = "main_001";
pub const CAMERA_DEVICE_ID: &str = "camera_001";

/// Event class a camera frame's `type` discriminator maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CameraEventClass {
    /// Re-emitted as `alert`.
    Alert,
    /// Re-emitted as `camera_status`.
    Status,
}

/// Connection supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub main: Endpoint,
    pub camera: Endpoint,
    /// Hard bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Fixed delay before a scheduled reconnect.
    pub reconnect_interval: Duration,
    /// Reconnects allowed per link before fallback is declared.
    pub max_reconnect_attempts: u32,
    /// Camera `type` discriminator → specialized event.
    pub camera_discriminators: HashMap<String, CameraEventClass>,
}

impl SupervisorConfig {
    /// The built-in discriminator table: `bird_detection` and `camera_status`.
    pub fn default_discriminators() -> HashMap<String, CameraEventClass> {
        HashMap::from([
            ("bird_detection".to_owned(), CameraEventClass::Alert),
            ("camera_status".to_owned(), CameraEventClass::Status),
        ])
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            main: Endpoint::new(DEFAULT_MAIN_HOST, DEFAULT_PORT, DEFAULT_PATH),
            camera: Endpoint::new(DEFAULT_CAMERA_HOST, DEFAULT_PORT, DEFAULT_PATH),
            connect_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            camera_discriminators: Self::default_discriminators(),
        }
    }
}

/// History aggregator tuning.
#[derive(Debug, Clone, Copy)]
pub struct HistoryConfig {
    /// Cap on each log's length.
    pub max_entries: usize,
    /// Minimum spacing between accepted environmental samples.
    pub env_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            env_interval: Duration::from_secs(60),
        }
    }
}

/// Debounced volume control tuning.
#[derive(Debug, Clone, Copy)]
pub struct VolumeConfig {
    /// Initial app-scale volume (0–100).
    pub initial: u8,
    /// Quiet period before a pending value is sent.
    pub debounce: Duration,
    /// How long after a send an identical remote status counts as an echo.
    pub echo_window: Duration,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            initial: 70,
            debounce: Duration::from_millis(300),
            echo_window: Duration::from_millis(100),
        }
    }
}

/// Cloud fallback tuning. The backend itself is injected separately.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub main_device_id: String,
    pub camera_device_id: String,
    /// How often the latest telemetry document is polled while main is in fallback.
    pub poll_interval: Duration,
}

impl CloudConfig {
    pub fn device_id(&self, role: bantay_api::BoardRole) -> &str {
        match role {
            bantay_api::BoardRole::Main => &self.main_device_id,
            bantay_api::BoardRole::Camera => &self.camera_device_id,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            main_device_id: MAIN_DEVICE_ID.into(),
            camera_device_id: CAMERA_DEVICE_ID.into(),
            poll_interval: Duration::from_secs(5),
        }
    }
}
