//! Hierarchical prefix sums on a grid of cores.
//!
//! A tensor is scanned along one axis. The work is split into one partition per core by a
//! [TilingConfig]; each core streams its partition through a small local buffer one tile at a
//! time, scanning every tile with a vector-friendly [Network] and chaining the tiles with a
//! carry. Cores covering the same scan lanes then exchange their totals and correct each other.
//!
//! ```
//! use tilescan::{ScanAttributes, cumsum};
//!
//! let input = [1, 2, 3, 4, 5, 6, 7];
//! let mut output = [0; 7];
//! cumsum::<i32>(&input, &mut output, &[7], 0, ScanAttributes::inclusive()).unwrap();
//! assert_eq!(output, [1, 3, 6, 10, 15, 21, 28]);
//! ```

mod buffer;
mod carry;
mod config;
mod engine;
mod error;
mod network;
mod plan;
mod precision;
mod propagate;
mod report;
mod shape;
mod streamer;

pub use buffer::*;
pub use carry::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use network::*;
pub use plan::*;
pub use precision::*;
pub use report::*;
pub use shape::*;

pub(crate) use propagate::*;
pub(crate) use streamer::*;

/// Reexport of the runtime, for its configuration.
pub use tilescan_runtime as runtime;

#[cfg(any(test, feature = "export_tests"))]
pub mod tests;

use tilescan_runtime::config::GlobalConfig;

/// Scan a contiguous tensor of shape `dims` along `axis`, using a tiling generated from the
/// global configuration.
pub fn cumsum<P: ScanPrecision>(
    input: &[P::EI],
    output: &mut [P::EI],
    dims: &[usize],
    axis: usize,
    attributes: ScanAttributes,
) -> Result<ScanReport, ScanError> {
    let shape = ScanShape::from_axis(dims, axis)?;
    let config = TilingConfig::generate::<P>(shape, attributes, &GlobalConfig::get().engine);

    ScanEngine::<P>::configure(config)?.run(input, output)
}
