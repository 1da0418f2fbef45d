//! Shared configuration for the BantayBot client.
//!
//! TOML file + `BANTAY_*` environment overrides, cloud credential
//! resolution (env + keyring + plaintext), and translation into the
//! `bantay_core` runtime config types.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bantay_core::config::{
    CAMERA_DEVICE_ID, DEFAULT_CAMERA_HOST, DEFAULT_MAIN_HOST, DEFAULT_PATH, DEFAULT_PORT,
    MAIN_DEVICE_ID,
};
use bantay_core::{
    CameraEventClass, CloudConfig, Endpoint, HistoryConfig, SupervisorConfig, VolumeConfig,
};

/// Env var that points at an alternate config file.
pub const CONFIG_PATH_ENV: &str = "BANTAY_CONFIG";

const KEYRING_SERVICE: &str = "bantay";
const KEYRING_ENTRY: &str = "cloud/api-key";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no cloud API key configured")]
    NoCredentials,

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_main")]
    pub main: BoardSection,

    #[serde(default = "default_camera")]
    pub camera: BoardSection,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub history: HistorySection,

    #[serde(default)]
    pub volume: VolumeSection,

    #[serde(default)]
    pub cloud: CloudSection,

    /// Camera frame `type` → event class, merged over the built-in table.
    #[serde(default = "SupervisorConfig::default_discriminators")]
    pub camera_events: HashMap<String, CameraEventClass>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main: default_main(),
            camera: default_camera(),
            reconnect: ReconnectSection::default(),
            history: HistorySection::default(),
            volume: VolumeSection::default(),
            cloud: CloudSection::default(),
            camera_events: SupervisorConfig::default_discriminators(),
        }
    }
}

/// WebSocket location of one board.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardSection {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,
}

fn default_main() -> BoardSection {
    BoardSection {
        host: DEFAULT_MAIN_HOST.into(),
        port: DEFAULT_PORT,
        path: DEFAULT_PATH.into(),
    }
}
fn default_camera() -> BoardSection {
    BoardSection {
        host: DEFAULT_CAMERA_HOST.into(),
        port: DEFAULT_PORT,
        path: DEFAULT_PATH.into(),
    }
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_path() -> String {
    DEFAULT_PATH.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistorySection {
    /// Where the logs are persisted. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_env_interval_secs")]
    pub env_interval_secs: u64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            dir: None,
            max_entries: default_max_entries(),
            env_interval_secs: default_env_interval_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    500
}
fn default_env_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VolumeSection {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_echo_window_ms")]
    pub echo_window_ms: u64,
}

impl Default for VolumeSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            echo_window_ms: default_echo_window_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_echo_window_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudSection {
    /// Document store REST base URL. The cloud path is disabled without it.
    pub base_url: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_main_device_id")]
    pub main_device_id: String,

    #[serde(default = "default_camera_device_id")]
    pub camera_device_id: String,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: None,
            api_key: None,
            poll_interval_secs: default_poll_interval_secs(),
            main_device_id: default_main_device_id(),
            camera_device_id: default_camera_device_id(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}
fn default_main_device_id() -> String {
    MAIN_DEVICE_ID.into()
}
fn default_camera_device_id() -> String {
    CAMERA_DEVICE_ID.into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "bantaybot", "bantay")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path: `$BANTAY_CONFIG`, else the platform
/// config dir.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || home_fallback(&[".config", "bantay", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default history directory under the platform data dir.
pub fn default_history_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "bantay", "history"]),
        |dirs| dirs.data_dir().join("history"),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) with `BANTAY_*` env overrides.
/// Nested keys use a double underscore: `BANTAY_MAIN__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BANTAY_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation / translation ────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, board) in [("main", &self.main), ("camera", &self.camera)] {
            if board.host.trim().is_empty() {
                return Err(invalid(&format!("{field}.host"), "must not be empty"));
            }
            if board.port == 0 {
                return Err(invalid(&format!("{field}.port"), "must be non-zero"));
            }
        }
        if self.history.max_entries == 0 {
            return Err(invalid("history.max_entries", "must be at least 1"));
        }
        for (field, value) in [
            ("reconnect.connect_timeout_ms", self.reconnect.connect_timeout_ms),
            ("volume.debounce_ms", self.volume.debounce_ms),
            ("cloud.poll_interval_secs", self.cloud.poll_interval_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be non-zero"));
            }
        }
        if let Some(ref base) = self.cloud.base_url {
            url::Url::parse(base)
                .map_err(|e| invalid("cloud.base_url", format!("invalid URL '{base}': {e}")))?;
        }
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            main: self.main.endpoint(),
            camera: self.camera.endpoint(),
            connect_timeout: Duration::from_millis(self.reconnect.connect_timeout_ms),
            reconnect_interval: Duration::from_millis(self.reconnect.interval_ms),
            max_reconnect_attempts: self.reconnect.max_attempts,
            camera_discriminators: self.camera_events.clone(),
        }
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig {
            max_entries: self.history.max_entries,
            env_interval: Duration::from_secs(self.history.env_interval_secs),
        }
    }

    pub fn volume_config(&self) -> VolumeConfig {
        VolumeConfig {
            debounce: Duration::from_millis(self.volume.debounce_ms),
            echo_window: Duration::from_millis(self.volume.echo_window_ms),
            ..VolumeConfig::default()
        }
    }

    pub fn cloud_config(&self) -> CloudConfig {
        CloudConfig {
            main_device_id: self.cloud.main_device_id.clone(),
            camera_device_id: self.cloud.camera_device_id.clone(),
            poll_interval: Duration::from_secs(self.cloud.poll_interval_secs),
        }
    }

    pub fn history_dir(&self) -> PathBuf {
        self.history.dir.clone().unwrap_or_else(default_history_dir)
    }
}

impl BoardSection {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.path.clone())
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the cloud API key: `api_key_env` → system keyring → plaintext.
pub fn resolve_cloud_api_key(cloud: &CloudSection) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = cloud.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = cloud.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials)
}

/// Save the cloud API key in the system keyring.
pub fn store_cloud_api_key(secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)
        .and_then(|entry| entry.set_password(secret))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}
