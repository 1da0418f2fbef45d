//! Shared helpers for command handlers.

use dialoguer::Confirm;

use bantay_core::{ConnectionStatus, ConnectionSupervisor};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, global: &GlobalOpts) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Connect both links and report the result on stderr unless quiet.
pub async fn connect(sup: &ConnectionSupervisor, global: &GlobalOpts) -> ConnectionStatus {
    if !global.quiet {
        let ep = sup.endpoints();
        eprintln!("Connecting to main ({}) and camera ({})...", ep.main, ep.camera);
    }
    let status = sup.connect_all().await;
    tracing::info!(main = status.main, camera = status.camera, "connect finished");
    status
}

/// `true` → "up", `false` → "down".
pub fn up_down(connected: bool) -> &'static str {
    if connected { "up" } else { "down" }
}
