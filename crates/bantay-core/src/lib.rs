// bantay-core: supervision, history and command dispatch between bantay-api and the CLI.

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod history;
pub mod schedule;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusEvent, EventBus, EventStream, HandlerError, Subscription};
pub use config::{CameraEventClass, CloudConfig, HistoryConfig, SupervisorConfig, VolumeConfig};
pub use dispatch::{Command, CommandDispatcher, CommandSink, Delivery, VolumeControl};
pub use error::CoreError;
pub use event::{EventKind, SupervisorEvent};
pub use history::{HistoryAggregator, HistoryExport};
pub use schedule::{ScheduledTask, TaskSlot};
pub use supervisor::{CloudLink, ConnectionStatus, ConnectionSupervisor, Endpoints};

pub use bantay_api::{BoardRole, Endpoint, LinkState};
