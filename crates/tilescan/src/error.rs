use core::ops::Range;
use thiserror::Error;
use tilescan_runtime::{BarrierError, CoreError, LaunchError};

use crate::ElemType;

/// Errors found while validating a tiling configuration.
///
/// They are all reported before any core starts, so nothing has been written when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The scanned axis is empty")]
    EmptyScanAxis,

    #[error("The {dim} dimension of the scan is empty")]
    EmptyShape { dim: &'static str },

    #[error("Axis {axis} is out of bounds for a tensor of rank {rank}")]
    AxisOutOfBounds { axis: usize, rank: usize },

    #[error("At least one core is required")]
    NoCores,

    #[error("{cores} cores were configured for only {elems} elements")]
    TooManyCores { cores: usize, elems: usize },

    #[error("Core {core} uses tiles of {tile_rows} rows, at least one row is required")]
    TileTooSmall { core: usize, tile_rows: usize },

    #[error("Core {core} splits its scan range into 0 segments")]
    InvalidSegments { core: usize },

    #[error("Core {core} streams tiles through 0 buffers")]
    InvalidBuffers { core: usize },

    #[error("The {dim} range {range:?} of core {core} exceeds the extent {extent}")]
    PartitionOutOfBounds {
        core: usize,
        dim: &'static str,
        range: Range<usize>,
        extent: usize,
    },

    #[error("Cores {first} and {second} cover the same elements")]
    PartitionOverlap { first: usize, second: usize },

    #[error("Cores {first} and {second} share scan lanes with different outer or inner ranges")]
    MisalignedGroup { first: usize, second: usize },

    #[error("{uncovered} elements are not covered by any core")]
    IncompleteCoverage { uncovered: usize },

    #[error(
        "Core {core} needs a local buffer of {required} bytes, only {available} bytes are available"
    )]
    BufferTooSmall {
        core: usize,
        required: usize,
        available: usize,
    },

    #[error("The tiling was computed for {config:?} accumulated in {config_acc:?}, the engine scans {engine:?} accumulated in {engine_acc:?}")]
    ElemMismatch {
        config: ElemType,
        config_acc: ElemType,
        engine: ElemType,
        engine_acc: ElemType,
    },
}

/// Errors returned by a scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Invalid configuration\nCaused by:\n  {0}")]
    Config(#[from] ConfigError),

    #[error("The {name} tensor has {actual} elements, the scan shape requires {expected}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("The {name} bytes can't be viewed as elements\nCaused by:\n  {reason}")]
    ByteCast { name: &'static str, reason: String },

    #[error("A core diverged at a barrier\nCaused by:\n  {0}")]
    Barrier(#[from] BarrierError),

    #[error("The core grid failed\nCaused by:\n  {0}")]
    Launch(#[from] LaunchError),
}

impl CoreError for ScanError {
    fn is_secondary(&self) -> bool {
        matches!(self, ScanError::Barrier(err) if err.is_secondary())
    }
}
