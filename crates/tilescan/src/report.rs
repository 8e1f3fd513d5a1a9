use core::fmt::Display;
use serde::{Deserialize, Serialize};

use crate::Network;

/// What one core did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreReport {
    pub core: usize,
    /// Tiles scanned during the local scan.
    pub tiles: usize,
    pub oneway_tiles: usize,
    pub twoway_tiles: usize,
    /// Tiles rewritten to apply a carry after their first store, either between segments of the
    /// core or from upstream cores.
    pub correction_tiles: usize,
    /// Cores whose totals were added to this one.
    pub upstream: usize,
}

impl CoreReport {
    pub fn new(core: usize) -> Self {
        Self {
            core,
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, network: Network) {
        self.tiles += 1;
        match network {
            Network::Oneway => self.oneway_tiles += 1,
            Network::Twoway { .. } => self.twoway_tiles += 1,
        }
    }
}

/// Per-core statistics of a run, in core order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub cores: Vec<CoreReport>,
}

impl ScanReport {
    pub fn new(cores: Vec<CoreReport>) -> Self {
        Self { cores }
    }

    pub fn tiles(&self) -> usize {
        self.cores.iter().map(|core| core.tiles).sum()
    }

    pub fn oneway_tiles(&self) -> usize {
        self.cores.iter().map(|core| core.oneway_tiles).sum()
    }

    pub fn twoway_tiles(&self) -> usize {
        self.cores.iter().map(|core| core.twoway_tiles).sum()
    }

    pub fn correction_tiles(&self) -> usize {
        self.cores.iter().map(|core| core.correction_tiles).sum()
    }
}

impl Display for ScanReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} cores, {} tiles ({} one-way, {} two-way), {} corrected",
            self.cores.len(),
            self.tiles(),
            self.oneway_tiles(),
            self.twoway_tiles(),
            self.correction_tiles()
        )
    }
}
