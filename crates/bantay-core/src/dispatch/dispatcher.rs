// ── Command dispatcher ──
//
// Sends commands to the board that executes them: over the local link
// when it is up, otherwise through the cloud command store.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use bantay_api::BoardRole;

use super::command::Command;
use crate::error::CoreError;
use crate::supervisor::ConnectionSupervisor;

/// How a command left the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Delivery {
    /// Written to the board's local link.
    Local { board: BoardRole },
    /// Queued in the cloud command store.
    Cloud { board: BoardRole, command_id: String },
}

/// Anything that can carry a command to a board.
pub trait CommandSink: Send + Sync {
    fn dispatch(&self, command: Command, params: Value) -> BoxFuture<'_, Result<Delivery, CoreError>>;
}

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    supervisor: ConnectionSupervisor,
}

impl CommandDispatcher {
    pub fn new(supervisor: ConnectionSupervisor) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    /// Send a command by wire name. Unknown names are rejected.
    pub async fn send_named(&self, name: &str, params: Value) -> Result<Delivery, CoreError> {
        let command = Command::parse(name)?;
        self.send(command, params).await
    }

    /// Send `command` to its board.
    ///
    /// The local link is used unless both links are in fallback. If the
    /// local send is dropped and a cloud backend is configured, the command
    /// is queued there instead.
    pub async fn send(&self, command: Command, params: Value) -> Result<Delivery, CoreError> {
        let board = command.target();
        let sup = &self.supervisor;
        let all_fallback =
            sup.is_in_fallback(BoardRole::Main) && sup.is_in_fallback(BoardRole::Camera);

        if !all_fallback && sup.send_to(board, &command.frame(&params)) {
            debug!(command = %command, board = %board, "command sent locally");
            return Ok(Delivery::Local { board });
        }

        let Some(cloud) = sup.cloud() else {
            warn!(command = %command, board = %board, "board offline and no cloud backend");
            return Err(if all_fallback {
                CoreError::CloudUnavailable
            } else {
                CoreError::NotConnected { board }
            });
        };

        let device_id = cloud.config.device_id(board);
        let command_id = cloud
            .backend
            .send_command(device_id, command.name(), params)
            .await?;
        info!(command = %command, device_id, command_id = %command_id, "command queued in cloud");
        Ok(Delivery::Cloud { board, command_id })
    }
}

impl CommandSink for CommandDispatcher {
    fn dispatch(&self, command: Command, params: Value) -> BoxFuture<'_, Result<Delivery, CoreError>> {
        self.send(command, params).boxed()
    }
}
