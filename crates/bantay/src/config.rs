//! CLI-side configuration: `--config` aware loading plus construction of
//! the supervisor and history aggregator from the resolved config.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, warn};

use bantay_api::{RestCloudClient, WebSocketDialer};
use bantay_config::ConfigError;
use bantay_core::history::FileStorage;
use bantay_core::{CloudLink, ConnectionSupervisor, HistoryAggregator};

pub use bantay_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` / `$BANTAY_CONFIG`, else the platform path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(bantay_config::config_path)
}

/// Load the config. A missing default file means defaults; a missing
/// explicitly named file is an error.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    if global.config.is_some() && !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    debug!(path = %path.display(), "loading config");
    Ok(bantay_config::load_config_from(&path)?)
}

/// Cloud API key, if one can be found. Absence is not an error: the store
/// may accept unauthenticated writes.
fn cloud_api_key(cfg: &Config) -> Result<Option<SecretString>, CliError> {
    match bantay_config::resolve_cloud_api_key(&cfg.cloud) {
        Ok(key) => Ok(Some(key)),
        Err(ConfigError::NoCredentials) => {
            warn!("no cloud API key configured, using unauthenticated requests");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Supervisor over real WebSocket links, with the cloud path when
/// `[cloud] base_url` is set.
pub fn build_supervisor(cfg: &Config) -> Result<ConnectionSupervisor, CliError> {
    let cloud = match cfg.cloud.base_url.as_deref() {
        Some(base) => {
            let client = RestCloudClient::new(base, cloud_api_key(cfg)?)?;
            Some(CloudLink {
                backend: Arc::new(client),
                config: cfg.cloud_config(),
            })
        }
        None => None,
    };

    Ok(ConnectionSupervisor::with_dialer(
        cfg.supervisor_config(),
        Arc::new(WebSocketDialer),
        cloud,
    ))
}

/// History aggregator over the configured history directory.
pub fn open_history(cfg: &Config) -> HistoryAggregator {
    let dir = cfg.history_dir();
    debug!(dir = %dir.display(), "opening history");
    HistoryAggregator::open(cfg.history_config(), Arc::new(FileStorage::new(dir)))
}
