// ── Telemetry history ──
//
// Bounded motion and environmental logs fed from the supervisor's
// main-board data stream.

mod aggregator;
mod clock;
mod entry;
mod export;
mod log;
mod stats;
mod storage;

pub use aggregator::{HistoryAggregator, HistoryChange, HistoryTopic, HistoryUpdate};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{EnvEntry, MotionEntry, is_motion};
pub use export::{
    DateRange, ExportSink, ExportSummary, FileExportSink, HistoryExport, export_file_name,
};
pub use log::{BoundedLog, PeriodicGate};
pub use stats::{MotionStats, RecentEnvEntry, motion_stats, recent_env};
pub use storage::{ENV_KEY, FileStorage, HistoryStorage, MOTION_KEY, MemoryStorage};
