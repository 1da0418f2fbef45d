// Cloud document/command store client
//
// The boards mirror their telemetry into a hosted document store and pick
// up queued commands from it. This is the remote path used when a local
// link has given up: read the latest telemetry document for a device, and
// queue a pending command for it.

use std::fmt;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::Error;

/// Remote store shared with the boards.
pub trait CloudBackend: Send + Sync {
    /// The most recent telemetry document for `device_id`, or `None` if the
    /// device has never reported.
    fn latest_telemetry<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>>;

    /// Queue a pending command for `device_id`. Returns the command id.
    fn send_command<'a>(
        &'a self,
        device_id: &'a str,
        action: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<String, Error>>;
}

/// Body of a queued command document.
#[derive(Debug, Clone, Serialize)]
pub struct PendingCommand<'a> {
    pub id: String,
    pub action: &'a str,
    pub params: Value,
    pub status: &'static str,
    pub created_at: String,
}

impl<'a> PendingCommand<'a> {
    pub fn new(action: &'a str, params: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            params,
            status: "pending",
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

// ── REST client ──────────────────────────────────────────────────────

/// HTTP client for a REST-fronted document store.
///
/// Endpoints:
/// - `GET  {base}/sensor_data/{device_id}` → latest telemetry (404 = none yet)
/// - `POST {base}/commands/{device_id}/pending` → queue a command
pub struct RestCloudClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl RestCloudClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("bantay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::from_reqwest(base_url, http, api_key)
    }

    /// Build on a pre-configured `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        api_key: Option<SecretString>,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────

    async fn fetch_telemetry(&self, device_id: &str) -> Result<Option<Value>, Error> {
        let url = self.url(&format!("sensor_data/{device_id}"))?;
        debug!("GET {}", url);

        let resp = self.authorize(self.http.get(url)).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::CloudApi {
                status: status.as_u16(),
                message: body,
            });
        }

        let doc: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;
        Ok(Some(doc))
    }

    async fn queue_command(
        &self,
        device_id: &str,
        action: &str,
        params: Value,
    ) -> Result<String, Error> {
        let url = self.url(&format!("commands/{device_id}/pending"))?;
        debug!("POST {}", url);

        let command = PendingCommand::new(action, params);
        let resp = self
            .authorize(self.http.post(url))
            .json(&command)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::CloudApi {
                status: status.as_u16(),
                message,
            });
        }

        Ok(command.id)
    }
}

impl CloudBackend for RestCloudClient {
    fn latest_telemetry<'a>(
        &'a self,
        device_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>> {
        self.fetch_telemetry(device_id).boxed()
    }

    fn send_command<'a>(
        &'a self,
        device_id: &'a str,
        action: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<String, Error>> {
        self.queue_command(device_id, action, params).boxed()
    }
}

impl fmt::Debug for RestCloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestCloudClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}
