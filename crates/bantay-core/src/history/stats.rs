// ── Derived history views ──
//
// Pure functions over log snapshots, generic over the time zone so the
// "local day" is whatever zone the caller passes in.

use std::fmt::Display;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use serde::Serialize;

use super::entry::{EnvEntry, MotionEntry};

const HOUR_MS: i64 = 3_600_000;

/// Today's motion activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionStats {
    pub total_today: usize,
    /// Motion count per local hour of day, index 0 = midnight.
    pub hourly_data: [u32; 24],
    /// Most recent motion entry in the whole log.
    pub last_motion: Option<MotionEntry>,
}

/// An environmental entry with display projections attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEnvEntry {
    #[serde(flatten)]
    pub entry: EnvEntry,
    /// `HH:MM` in the caller's zone.
    pub time: String,
    /// `YYYY-MM-DD` in the caller's zone.
    pub date: String,
}

/// Bucket `history` (newest first) by hour for the calendar day containing `now`.
pub fn motion_stats<Tz: TimeZone>(history: &[MotionEntry], now: &DateTime<Tz>) -> MotionStats {
    let day_start = day_start_ms(now);
    let tz = now.timezone();

    let mut hourly_data = [0u32; 24];
    let mut total_today = 0;
    for entry in history.iter().filter(|e| e.timestamp >= day_start) {
        total_today += 1;
        let hour = DateTime::from_timestamp_millis(entry.timestamp)
            .map(|t| t.with_timezone(&tz).hour())
            .and_then(|h| usize::try_from(h).ok());
        if let Some(bucket) = hour.and_then(|h| hourly_data.get_mut(h)) {
            *bucket += 1;
        }
    }

    MotionStats {
        total_today,
        hourly_data,
        last_motion: history.first().cloned(),
    }
}

/// Entries from the trailing `hours` window, newest first.
pub fn recent_env<Tz>(history: &[EnvEntry], now: &DateTime<Tz>, hours: u32) -> Vec<RecentEnvEntry>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let cutoff = now.timestamp_millis() - i64::from(hours) * HOUR_MS;
    let tz = now.timezone();

    history
        .iter()
        .filter(|e| e.timestamp >= cutoff)
        .filter_map(|e| {
            let local = DateTime::from_timestamp_millis(e.timestamp)?.with_timezone(&tz);
            Some(RecentEnvEntry {
                entry: e.clone(),
                time: local.format("%H:%M").to_string(),
                date: local.format("%Y-%m-%d").to_string(),
            })
        })
        .collect()
}

fn day_start_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map_or_else(
            // Midnight skipped by a DST jump: count from the wall-clock offset.
            || {
                now.timestamp_millis()
                    - i64::from(now.time().num_seconds_from_midnight()) * 1_000
            },
            |start| start.timestamp_millis(),
        )
}
