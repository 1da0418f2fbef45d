//! `bantay monitor`: live event stream from both boards.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::Local;
use futures::StreamExt;
use owo_colors::OwoColorize;

use bantay_core::{EventKind, SupervisorEvent};

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

fn parse_duration(value: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(value).map_err(|e| CliError::Validation {
        field: "duration".into(),
        reason: format!("'{value}': {e}"),
    })
}

fn parse_kinds(values: &[String]) -> Result<HashSet<EventKind>, CliError> {
    values
        .iter()
        .map(|v| {
            EventKind::from_str(v).map_err(|_| CliError::Validation {
                field: "only".into(),
                reason: format!("unknown event kind '{v}'"),
            })
        })
        .collect()
}

/// One rendered line (or YAML document) per event.
fn render_event(
    event: &SupervisorEvent,
    format: &OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_json(&event.to_json(), true)
        }
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(&event.to_json())?)),
        OutputFormat::Plain => Ok(format!("{} {}", event.kind(), event.payload())),
        OutputFormat::Table => {
            let kind = format!("{:<20}", event.kind().to_string());
            let kind = if color {
                match event.kind() {
                    EventKind::Alert | EventKind::Error => kind.red().to_string(),
                    EventKind::Fallback | EventKind::Disconnected => kind.yellow().to_string(),
                    EventKind::MainData | EventKind::CameraData => kind.cyan().to_string(),
                    _ => kind.green().to_string(),
                }
            } else {
                kind
            };
            Ok(format!(
                "{}  {kind}  {}",
                Local::now().format("%H:%M:%S"),
                event.payload()
            ))
        }
    }
}

pub async fn handle(cfg: &Config, args: MonitorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let only = parse_kinds(&args.only)?;
    let color = output::should_color(&global.color);

    let sup = config::build_supervisor(cfg)?;
    let history = (!args.no_history).then(|| config::open_history(cfg));
    if let Some(ref history) = history {
        history.start(&sup);
    }

    // Subscribed before connecting so the connection events are shown.
    let mut events = sup.events();
    util::connect(&sup, global).await;

    let stop = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            () = &mut stop => break,
            event = events.next() => {
                let Some(event) = event else { break };
                if only.is_empty() || only.contains(&event.kind()) {
                    let line = render_event(&event, &global.output, color)?;
                    output::print_output(&line, global.quiet);
                }
            }
        }
    }

    tracing::info!("monitor stopping");
    sup.disconnect_all().await;
    if let Some(history) = history {
        history.stop();
    }
    Ok(())
}
