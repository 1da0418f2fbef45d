//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use bantay_config::ConfigError;
use bantay_core::{BoardRole, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect: {reason}")]
    #[diagnostic(
        code(bantay::connection_failed),
        help(
            "Check that both boards are powered and on the same network.\n\
             Endpoints are set in the [main] and [camera] config sections."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("The {board} board is not connected")]
    #[diagnostic(
        code(bantay::not_connected),
        help(
            "Run: bantay status\n\
             Configure [cloud] base_url to queue commands while the boards are offline."
        )
    )]
    NotConnected { board: BoardRole },

    #[error("Timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(bantay::timeout),
        help("Raise [reconnect] connect_timeout_ms or check the board's Wi-Fi signal.")
    )]
    Timeout { timeout_ms: u64 },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Unknown command '{name}'")]
    #[diagnostic(
        code(bantay::unknown_command),
        help("Run: bantay commands to see the available commands")
    )]
    UnknownCommand { name: String },

    // ── Cloud ────────────────────────────────────────────────────────
    #[error("Cloud error: {message}")]
    #[diagnostic(code(bantay::cloud))]
    Cloud { message: String },

    #[error("No cloud API key configured")]
    #[diagnostic(
        code(bantay::no_credentials),
        help(
            "Store one with: bantay config set-key\n\
             Or name an environment variable in [cloud] api_key_env."
        )
    )]
    NoCredentials,

    // ── Storage ──────────────────────────────────────────────────────
    #[error("History storage failed ({key}): {message}")]
    #[diagnostic(code(bantay::storage))]
    Storage { key: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bantay::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(bantay::no_config),
        help(
            "Create one with: bantay config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(bantay::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(bantay::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(bantay::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(bantay::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(bantay::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoCredentials => exit_code::AUTH,
            Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::UnknownCommand { .. }
            | Self::Validation { .. }
            | Self::ConfigExists { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::NotConnected { board } => CliError::NotConnected { board },
            CoreError::Timeout { timeout_ms } => CliError::Timeout { timeout_ms },
            CoreError::UnknownCommand { name } => CliError::UnknownCommand { name },
            CoreError::Storage { key, message } => CliError::Storage { key, message },
            CoreError::Serialization(e) => CliError::Json(e),
            CoreError::Cloud { message, status } => CliError::Cloud {
                message: match status {
                    Some(code) => format!("HTTP {code}: {message}"),
                    None => message,
                },
            },
            CoreError::CloudUnavailable => CliError::ConnectionFailed {
                reason: "both boards are offline and no cloud backend is configured".into(),
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<bantay_api::Error> for CliError {
    fn from(err: bantay_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials => CliError::NoCredentials,
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
