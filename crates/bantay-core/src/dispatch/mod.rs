// ── Command dispatch ──
//
// User intents → board commands, including the debounced volume path.

mod command;
pub mod convert;
mod dispatcher;
mod volume;

pub use command::{Command, CommandCategory};
pub use convert::{app_to_hardware, hardware_to_app};
pub use dispatcher::{CommandDispatcher, CommandSink, Delivery};
pub use volume::{VolumeControl, VolumeError};
