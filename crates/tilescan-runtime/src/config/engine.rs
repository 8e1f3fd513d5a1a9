use std::time::Duration;

/// Sizing of the core grid and of each core's local buffer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Number of cores used when a tiling is generated. `None` uses the available parallelism.
    #[serde(default)]
    pub cores: Option<usize>,

    /// Byte budget of the fast local buffer owned by each core.
    #[serde(default = "default_ub_bytes")]
    pub ub_bytes: usize,

    /// Width of one vector operation in bytes, used to derive the lane width of the scan networks.
    #[serde(default = "default_vector_bytes")]
    pub vector_bytes: usize,

    /// How long a core may wait at a barrier before the whole run is aborted.
    #[serde(default = "default_barrier_timeout_ms")]
    pub barrier_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cores: None,
            ub_bytes: default_ub_bytes(),
            vector_bytes: default_vector_bytes(),
            barrier_timeout_ms: default_barrier_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// The number of cores to launch when nothing more specific is requested.
    pub fn core_count(&self) -> usize {
        self.cores.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        })
    }

    /// The barrier timeout as a [Duration].
    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }
}

fn default_ub_bytes() -> usize {
    192 * 1024
}

fn default_vector_bytes() -> usize {
    256
}

fn default_barrier_timeout_ms() -> Option<u64> {
    Some(30_000)
}
