// ── History export ──
//
// A single JSON snapshot of both logs plus a summary, handed to a
// download collaborator (a file in a directory for the CLI).

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{EnvEntry, MotionEntry};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    /// ISO-8601 creation time.
    pub export_date: String,
    pub motion_history: Vec<MotionEntry>,
    pub env_history: Vec<EnvEntry>,
    pub summary: ExportSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_motion_events: usize,
    pub total_env_samples: usize,
    pub date_range: DateRange,
}

/// Oldest and newest timestamps across both logs (epoch milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub oldest: i64,
    pub newest: i64,
}

impl HistoryExport {
    /// Snapshot both newest-first logs as of `now`.
    ///
    /// An empty log contributes `now` to `oldest` and `0` to `newest`.
    pub fn build(
        motion_history: Vec<MotionEntry>,
        env_history: Vec<EnvEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        let now_ms = now.timestamp_millis();
        let oldest = motion_history
            .last()
            .map_or(now_ms, |e| e.timestamp)
            .min(env_history.last().map_or(now_ms, |e| e.timestamp));
        let newest = motion_history
            .first()
            .map_or(0, |e| e.timestamp)
            .max(env_history.first().map_or(0, |e| e.timestamp));

        Self {
            export_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            summary: ExportSummary {
                total_motion_events: motion_history.len(),
                total_env_samples: env_history.len(),
                date_range: DateRange { oldest, newest },
            },
            motion_history,
            env_history,
        }
    }
}

/// `bantaybot-history-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("bantaybot-history-{}.json", date.format("%Y-%m-%d"))
}

/// Receives a finished export.
pub trait ExportSink: Send + Sync {
    /// Deliver `export` under `file_name`; returns where it ended up.
    fn deliver(&self, file_name: &str, export: &HistoryExport) -> Result<String, CoreError>;
}

/// Writes exports as pretty-printed JSON files into a directory.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for FileExportSink {
    fn deliver(&self, file_name: &str, export: &HistoryExport) -> Result<String, CoreError> {
        let body = serde_json::to_string_pretty(export)?;
        fs::create_dir_all(&self.dir).map_err(|e| CoreError::storage(file_name, e))?;
        let path = self.dir.join(file_name);
        fs::write(&path, body).map_err(|e| CoreError::storage(file_name, e))?;
        Ok(path.display().to_string())
    }
}
