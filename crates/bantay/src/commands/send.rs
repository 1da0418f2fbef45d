//! `bantay send` and `bantay commands`.

use serde::Serialize;
use serde_json::{Map, Value};
use strum::IntoEnumIterator;
use tabled::Tabled;

use bantay_core::{BoardRole, Command, CommandDispatcher, Delivery};

use crate::cli::{GlobalOpts, SendArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Parameters ──────────────────────────────────────────────────────

/// `key=value` pairs into a JSON object. Values that parse as JSON keep
/// their type (`angle=45` is a number); anything else is a string.
fn parse_params(pairs: &[String]) -> Result<Value, CliError> {
    let mut map = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(CliError::Validation {
                field: "param".into(),
                reason: format!("expected KEY=VALUE, got '{pair}'"),
            });
        };
        if key.is_empty() {
            return Err(CliError::Validation {
                field: "param".into(),
                reason: format!("empty key in '{pair}'"),
            });
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        map.insert(key.to_owned(), value);
    }
    Ok(Value::Object(map))
}

fn parse_json_object(raw: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(raw)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::Validation {
            field: "json".into(),
            reason: "parameters must be a JSON object".into(),
        })
    }
}

// ── Handlers ────────────────────────────────────────────────────────

fn describe(command: Command, delivery: &Delivery) -> String {
    match delivery {
        Delivery::Local { board } => format!("{command} sent to {board} board"),
        Delivery::Cloud { board, command_id } => {
            format!("{command} queued in cloud for {board} board (id {command_id})")
        }
    }
}

pub async fn handle(cfg: &Config, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Rejected before any connection is made.
    let command = Command::parse(&args.command)?;
    let params = match args.json {
        Some(ref raw) => parse_json_object(raw)?,
        None => parse_params(&args.params)?,
    };

    let sup = config::build_supervisor(cfg)?;
    util::connect(&sup, global).await;

    let dispatcher = CommandDispatcher::new(sup.clone());
    let result = dispatcher.send(command, params).await;
    sup.disconnect_all().await;
    let delivery = result?;

    let out = output::render_single(&global.output, &delivery, |d| describe(command, d))?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Debug, Serialize)]
struct CatalogueEntry {
    name: &'static str,
    category: String,
    board: BoardRole,
}

#[derive(Tabled)]
struct CatalogueRow {
    #[tabled(rename = "Command")]
    name: &'static str,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Board")]
    board: String,
}

/// `bantay commands`: the full command catalogue.
pub fn list(global: &GlobalOpts) -> Result<(), CliError> {
    let entries: Vec<CatalogueEntry> = Command::iter()
        .map(|c| CatalogueEntry {
            name: c.name(),
            category: c.category().to_string(),
            board: c.target(),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &entries,
        |e| CatalogueRow {
            name: e.name,
            category: e.category.clone(),
            board: e.board.to_string(),
        },
        |e| e.name.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
