/// Configuration for logging in tilescan.
///
/// Everything goes through the `log` facade; this only selects the level used for run summaries.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LoggerConfig {
    /// Crate-level logging of run summaries. `None` disables them.
    #[serde(default)]
    pub log: Option<LogCrateLevel>,
}

impl LoggerConfig {
    /// The `log` level used for run summaries, if enabled.
    pub fn level(&self) -> Option<log::Level> {
        self.log.map(|level| match level {
            LogCrateLevel::Info => log::Level::Info,
            LogCrateLevel::Debug => log::Level::Debug,
            LogCrateLevel::Trace => log::Level::Trace,
        })
    }
}

/// Log levels using the `log` crate.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}
