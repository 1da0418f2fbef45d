//! History command handlers: read, export and clear the persisted logs.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use tabled::Tabled;

use bantay_core::HistoryAggregator;
use bantay_core::history::{
    EnvEntry, FileExportSink, MotionEntry, MotionStats, RecentEnvEntry, export_file_name,
};

use crate::cli::{GlobalOpts, HistoryArgs, HistoryCommand};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, opt_num};

use super::util;

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct MotionRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Distance (cm)")]
    distance: String,
}

#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Temp (°C)")]
    temperature: String,
    #[tabled(rename = "Humidity (%)")]
    humidity: String,
    #[tabled(rename = "Soil Moisture")]
    soil_moisture: String,
    #[tabled(rename = "Soil Temp (°C)")]
    soil_temperature: String,
}

fn local_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

fn motion_row(e: &MotionEntry) -> MotionRow {
    MotionRow {
        time: local_time(e.timestamp),
        distance: opt_num(e.distance),
    }
}

fn env_row(e: &EnvEntry) -> EnvRow {
    EnvRow {
        time: local_time(e.timestamp),
        temperature: opt_num(e.temperature),
        humidity: opt_num(e.humidity),
        soil_moisture: opt_num(e.soil_moisture),
        soil_temperature: opt_num(e.soil_temperature),
    }
}

fn recent_row(e: &RecentEnvEntry) -> EnvRow {
    EnvRow {
        time: format!("{} {}", e.date, e.time),
        ..env_row(&e.entry)
    }
}

fn stats_detail(stats: &MotionStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Motion today: {}", stats.total_today);
    match stats.last_motion {
        Some(ref last) => {
            let _ = writeln!(out, "Last motion:  {}", local_time(last.timestamp));
        }
        None => {
            let _ = writeln!(out, "Last motion:  -");
        }
    }
    let peak = stats.hourly_data.iter().copied().max().unwrap_or(0).max(1);
    for (hour, count) in stats.hourly_data.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let width = usize::try_from(count * 30 / peak).unwrap_or(30).max(1);
        let _ = writeln!(out, "{hour:02}:00  {count:>4}  {}", "#".repeat(width));
    }
    out.trim_end().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

fn export(history: &HistoryAggregator, out: Option<PathBuf>) -> Result<String, CliError> {
    let dir = match out {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let export = history
        .export_history(&FileExportSink::new(&dir))
        .ok_or_else(|| CliError::Storage {
            key: dir.display().to_string(),
            message: "export could not be written".into(),
        })?;

    let path = dir.join(export_file_name(Utc::now().date_naive()));
    Ok(format!(
        "Exported {} motion events and {} samples to {}",
        export.summary.total_motion_events,
        export.summary.total_env_samples,
        path.display()
    ))
}

pub fn handle(cfg: &Config, args: HistoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let history = config::open_history(cfg);

    let out = match args.command {
        HistoryCommand::Motion { limit } => {
            let mut entries = history.motion_history();
            entries.truncate(limit);
            output::render_list(&global.output, &entries, motion_row, |e| {
                format!("{} {}", e.timestamp, opt_num(e.distance))
            })?
        }
        HistoryCommand::Env { limit } => {
            let mut entries = history.env_history();
            entries.truncate(limit);
            output::render_list(&global.output, &entries, env_row, |e| {
                format!("{} {}", e.timestamp, opt_num(e.temperature))
            })?
        }
        HistoryCommand::Stats => {
            let stats = history.today_motion_stats();
            output::render_single(&global.output, &stats, stats_detail)?
        }
        HistoryCommand::Recent { hours } => {
            let entries = history.recent_env_history(hours);
            output::render_list(&global.output, &entries, recent_row, |e| {
                format!("{} {} {}", e.date, e.time, opt_num(e.entry.temperature))
            })?
        }
        HistoryCommand::Export { out } => export(&history, out)?,
        HistoryCommand::Clear => {
            if !util::confirm("Delete all recorded history?", "history clear", global)? {
                return Ok(());
            }
            if !history.clear_all() {
                return Err(CliError::Storage {
                    key: cfg.history_dir().display().to_string(),
                    message: "history could not be cleared".into(),
                });
            }
            "History cleared".to_owned()
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
