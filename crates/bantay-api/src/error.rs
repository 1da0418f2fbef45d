use thiserror::Error;

use crate::link::BoardRole;

/// Top-level error type for the `bantay-api` crate.
///
/// Covers every failure mode across the transport surfaces: the local
/// WebSocket links to the two boards and the cloud document/command store.
/// `bantay-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Local links ─────────────────────────────────────────────────
    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Connection attempt exceeded the hard timeout.
    #[error("{board} board did not answer within {timeout_ms}ms")]
    ConnectTimeout { board: BoardRole, timeout_ms: u64 },

    /// Inbound or outbound frame was not valid JSON.
    #[error("invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    // ── Cloud ───────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success status from the cloud store.
    #[error("Cloud API error (HTTP {status}): {message}")]
    CloudApi { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::WebSocketConnect(_) | Self::ConnectTimeout { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::CloudApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
