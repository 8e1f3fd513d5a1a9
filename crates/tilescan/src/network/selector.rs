use core::fmt::Debug;

use crate::{MAX_FOLD, Network, ScanNumeric};

/// Chooses the network used on each tile.
pub trait NetworkSelector: Send + Sync + Debug {
    /// The network for a tile of `rows` rows and `lanes` lanes.
    fn select(&self, rows: usize, lanes: usize) -> Network;
}

/// Default heuristic.
///
/// The two-way network only pays off when a tile has fewer rows than a vector has lanes and the
/// rows are narrow enough for several chunks to share a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSelector {
    /// Accumulator values per vector operation.
    pub lane_width: usize,
    pub max_fold: usize,
    /// Tiles wider than this always use the one-way network.
    pub fold_lane_limit: usize,
}

impl ThresholdSelector {
    pub fn new(lane_width: usize) -> Self {
        Self {
            lane_width: lane_width.max(1),
            max_fold: MAX_FOLD,
            fold_lane_limit: 32,
        }
    }

    /// Thresholds for accumulating in `A` with vectors of `vector_bytes` bytes.
    pub fn for_accumulator<A: ScanNumeric>(vector_bytes: usize) -> Self {
        Self::new(vector_bytes / size_of::<A>())
    }
}

impl Default for ThresholdSelector {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NetworkSelector for ThresholdSelector {
    fn select(&self, rows: usize, lanes: usize) -> Network {
        if rows < 4 || rows >= self.lane_width || lanes == 0 || lanes > self.fold_lane_limit {
            return Network::Oneway;
        }

        let fold = (self.lane_width / lanes)
            .min(self.max_fold.min(MAX_FOLD))
            .min(rows / 2);

        match fold {
            0 | 1 => Network::Oneway,
            fold => Network::Twoway { fold },
        }
    }
}

/// Always picks the same network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSelector(pub Network);

impl NetworkSelector for FixedSelector {
    fn select(&self, _rows: usize, _lanes: usize) -> Network {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_narrow_tiles_are_folded() {
        let selector = ThresholdSelector::for_accumulator::<f32>(256);
        assert_eq!(selector.lane_width, 64);

        assert_eq!(selector.select(16, 1), Network::Twoway { fold: 8 });
        assert_eq!(selector.select(16, 16), Network::Twoway { fold: 4 });
        assert_eq!(selector.select(6, 4), Network::Twoway { fold: 3 });
    }

    #[test]
    fn tall_or_wide_tiles_are_not() {
        let selector = ThresholdSelector::for_accumulator::<f32>(256);

        assert_eq!(selector.select(64, 1), Network::Oneway);
        assert_eq!(selector.select(1024, 4), Network::Oneway);
        assert_eq!(selector.select(16, 33), Network::Oneway);
        assert_eq!(selector.select(16, 64), Network::Oneway);
        assert_eq!(selector.select(2, 1), Network::Oneway);
    }

    #[test]
    fn fixed_selection() {
        let selector = FixedSelector(Network::Twoway { fold: 2 });
        assert_eq!(selector.select(1000, 1000), Network::Twoway { fold: 2 });
    }
}
