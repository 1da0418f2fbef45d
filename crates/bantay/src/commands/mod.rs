//! Command dispatch: bridges CLI args -> core services -> output formatting.

pub mod config_cmd;
pub mod history;
pub mod monitor;
pub mod send;
pub mod status;
pub mod util;
pub mod volume;

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a config-bound command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(cfg, args, global).await,
        Command::Status => status::handle(cfg, global).await,
        Command::History(args) => history::handle(cfg, args, global),
        Command::Send(args) => send::handle(cfg, args, global).await,
        Command::Volume(args) => volume::handle(cfg, args, global).await,
        // Handled before a config is loaded
        Command::Commands | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
