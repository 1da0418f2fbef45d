//! `bantay status`: one connection attempt per board, then a report.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::Tabled;

use bantay_core::{BoardRole, ConnectionSupervisor, LinkState};

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct BoardStatus {
    board: BoardRole,
    endpoint: String,
    connected: bool,
    state: LinkState,
    last_open: Option<DateTime<Utc>>,
    cloud_fallback: bool,
}

#[derive(Tabled)]
struct BoardRow {
    #[tabled(rename = "Board")]
    board: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Link")]
    link: &'static str,
    #[tabled(rename = "Last Open")]
    last_open: String,
    #[tabled(rename = "Cloud")]
    cloud: &'static str,
}

fn board_status(sup: &ConnectionSupervisor, role: BoardRole) -> BoardStatus {
    let endpoints = sup.endpoints();
    let endpoint = match role {
        BoardRole::Main => endpoints.main,
        BoardRole::Camera => endpoints.camera,
    };
    BoardStatus {
        board: role,
        endpoint: endpoint.to_string(),
        connected: sup.link_state(role) == LinkState::Open,
        state: sup.link_state(role),
        last_open: sup.last_open(role),
        cloud_fallback: sup.has_cloud(),
    }
}

fn to_row(s: &BoardStatus) -> BoardRow {
    BoardRow {
        board: s.board.to_string(),
        endpoint: s.endpoint.clone(),
        link: util::up_down(s.connected),
        last_open: s.last_open.map_or_else(
            || "-".into(),
            |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        cloud: if s.cloud_fallback { "configured" } else { "-" },
    }
}

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let sup = config::build_supervisor(cfg)?;
    let status = util::connect(&sup, global).await;

    let boards = [
        board_status(&sup, BoardRole::Main),
        board_status(&sup, BoardRole::Camera),
    ];
    sup.disconnect_all().await;

    let out = output::render_list(&global.output, &boards, to_row, |s| {
        format!("{} {}", s.board, util::up_down(s.connected))
    })?;
    output::print_output(&out, global.quiet);

    if status.main || status.camera {
        Ok(())
    } else {
        Err(CliError::ConnectionFailed {
            reason: "neither board answered".into(),
        })
    }
}
