// ── Core error types ──
//
// User-facing errors from bantay-core. Consumers never see raw reqwest or
// tungstenite failures; the `From<bantay_api::Error>` impl translates
// transport-layer errors into domain variants.

use bantay_api::BoardRole;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect: {reason}")]
    ConnectionFailed { reason: String },

    #[error("{board} board not connected")]
    NotConnected { board: BoardRole },

    #[error("Connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Storage error ({key}): {message}")]
    Storage { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Cloud errors ─────────────────────────────────────────────────
    #[error("Cloud API error: {message}")]
    Cloud {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Both boards are in cloud fallback but no cloud backend is configured")]
    CloudUnavailable,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn storage(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            key: key.to_owned(),
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bantay_api::Error> for CoreError {
    fn from(err: bantay_api::Error) -> Self {
        match err {
            bantay_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            bantay_api::Error::ConnectTimeout { timeout_ms, .. } => {
                CoreError::Timeout { timeout_ms }
            }
            bantay_api::Error::Frame(e) => CoreError::Serialization(e),
            bantay_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_ms: 0 }
                } else {
                    CoreError::Cloud {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            bantay_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            bantay_api::Error::CloudApi { status, message } => CoreError::Cloud {
                message,
                status: Some(status),
            },
            bantay_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_status_is_preserved() {
        let err: CoreError = bantay_api::Error::CloudApi {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Cloud { status: Some(503), .. }));
    }

    #[test]
    fn timeout_maps_to_timeout() {
        let err: CoreError = bantay_api::Error::ConnectTimeout {
            board: BoardRole::Camera,
            timeout_ms: 5000,
        }
        .into();
        assert_eq!(err.to_string(), "Connection timed out after 5000ms");
    }
}
