/// Engine sizing and synchronization settings.
pub mod engine;
/// Logging settings.
pub mod logger;

mod base;

pub use base::*;
pub use engine::EngineConfig;
pub use logger::{LogCrateLevel, LoggerConfig};
