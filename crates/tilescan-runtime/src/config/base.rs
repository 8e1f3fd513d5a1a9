use super::{engine::EngineConfig, logger::LoggerConfig};
use std::path::Path;
use std::sync::Arc;

/// Static mutex holding the global configuration, initialized as `None`.
static TILESCAN_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> = spin::Mutex::new(None);

const CONFIG_FILE_NAMES: [&str; 2] = ["tilescan.toml", "TileScan.toml"];

/// Represents the global configuration for tilescan, combining engine and logging settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Sizing of the core grid, local buffers and barrier behavior.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging of run summaries.
    #[serde(default)]
    pub logger: LoggerConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it from the current directory if not set.
    ///
    /// If no configuration is set, it attempts to load one from `tilescan.toml` or `TileScan.toml`
    /// in the current directory or its parents, then applies the `TILESCAN_*` environment
    /// overrides. If no file is found, a default configuration is used.
    ///
    /// # Notes
    ///
    /// The configuration sits behind a global lock. Read it once when building an engine rather
    /// than on every run.
    pub fn get() -> Arc<Self> {
        let mut state = TILESCAN_GLOBAL_CONFIG.lock();

        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    ///
    /// # Warning
    /// This method must be called at the start of the program, before any calls to `get`.
    pub fn set(config: Self) {
        let mut state = TILESCAN_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let config = Self::get();
        let content = toml::to_string_pretty(config.as_ref())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        std::fs::write(path, content)
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(mut self) -> Self {
        if let Some(cores) = env_usize("TILESCAN_CORES") {
            self.engine.cores = (cores > 0).then_some(cores);
        }

        if let Some(ub_bytes) = env_usize("TILESCAN_UB_BYTES") {
            self.engine.ub_bytes = ub_bytes;
        }

        if let Some(vector_bytes) = env_usize("TILESCAN_VECTOR_BYTES") {
            self.engine.vector_bytes = vector_bytes;
        }

        if let Ok(val) = std::env::var("TILESCAN_BARRIER_TIMEOUT_MS") {
            match val.as_str() {
                "0" | "none" | "off" => self.engine.barrier_timeout_ms = None,
                millis => {
                    if let Ok(millis) = millis.parse::<u64>() {
                        self.engine.barrier_timeout_ms = Some(millis);
                    }
                }
            }
        }

        if let Ok(val) = std::env::var("TILESCAN_LOG") {
            self.logger.log = match val.as_str() {
                "info" => Some(super::LogCrateLevel::Info),
                "debug" => Some(super::LogCrateLevel::Debug),
                "trace" => Some(super::LogCrateLevel::Trace),
                "0" | "off" | "false" => None,
                _ => self.logger.log,
            };
        }

        self
    }

    // Traverses up the directory tree until a valid configuration file is found or the root is reached.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            for name in CONFIG_FILE_NAMES {
                if let Ok(config) = Self::from_file_path(dir.join(name)) {
                    return config;
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    fn from_file_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        toml::from_str(&content).map_err(|err| {
            log::warn!(
                "Ignoring {}, it doesn't have the right format: {err}",
                path.as_ref().display()
            );
            std::io::Error::new(std::io::ErrorKind::InvalidData, err)
        })
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LogCrateLevel;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "TILESCAN_CORES",
            "TILESCAN_UB_BYTES",
            "TILESCAN_VECTOR_BYTES",
            "TILESCAN_BARRIER_TIMEOUT_MS",
            "TILESCAN_LOG",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn env_overrides_engine_settings() {
        clear_env();
        unsafe {
            std::env::set_var("TILESCAN_CORES", "3");
            std::env::set_var("TILESCAN_UB_BYTES", "4096");
            std::env::set_var("TILESCAN_BARRIER_TIMEOUT_MS", "none");
            std::env::set_var("TILESCAN_LOG", "trace");
        }

        let config = GlobalConfig::default().override_from_env();
        clear_env();

        assert_eq!(config.engine.cores, Some(3));
        assert_eq!(config.engine.ub_bytes, 4096);
        assert_eq!(config.engine.barrier_timeout_ms, None);
        assert_eq!(config.logger.log, Some(LogCrateLevel::Trace));
    }

    #[test]
    #[serial]
    fn malformed_env_values_are_ignored() {
        clear_env();
        unsafe {
            std::env::set_var("TILESCAN_UB_BYTES", "lots");
            std::env::set_var("TILESCAN_BARRIER_TIMEOUT_MS", "soon");
        }

        let config = GlobalConfig::default().override_from_env();
        clear_env();

        let default = EngineConfig::default();
        assert_eq!(config.engine.ub_bytes, default.ub_bytes);
        assert_eq!(config.engine.barrier_timeout_ms, default.barrier_timeout_ms);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = GlobalConfig::default();
        config.engine.cores = Some(8);
        config.logger.log = Some(LogCrateLevel::Debug);

        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: GlobalConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.engine.cores, Some(8));
        assert_eq!(parsed.logger.log, Some(LogCrateLevel::Debug));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: GlobalConfig = toml::from_str("[engine]\nvector_bytes = 64\n").unwrap();

        assert_eq!(parsed.engine.vector_bytes, 64);
        assert_eq!(parsed.engine.ub_bytes, EngineConfig::default().ub_bytes);
        assert_eq!(parsed.logger.log, None);
    }
}
