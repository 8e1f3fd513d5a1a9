mod oneway;
mod selector;
mod twoway;

pub use oneway::*;
pub use selector::*;
pub use twoway::*;

use serde::{Deserialize, Serialize};

use crate::{ScanNumeric, TileMut};

/// Largest number of chunks the two-way network folds a tile into.
pub const MAX_FOLD: usize = 8;

/// The in-buffer scan network used on a resident tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Sklansky network along the scanned rows of the tile.
    Oneway,
    /// The tile is folded into `fold` chunks scanned side by side, then the chunk offsets are
    /// scanned and applied.
    Twoway { fold: usize },
}

impl Network {
    /// Turn every row of `tile` into the inclusive scan of the rows before it in scan order.
    ///
    /// `scratch` is only used by the two-way network.
    pub fn scan<A: ScanNumeric>(self, tile: &mut TileMut<'_, A>, reverse: bool, scratch: &mut Vec<A>) {
        match self {
            Network::Oneway => Oneway::scan(tile, reverse),
            Network::Twoway { fold } => Twoway::new(fold).scan(tile, reverse, scratch),
        }
    }

    pub fn is_twoway(&self) -> bool {
        matches!(self, Network::Twoway { .. })
    }
}
