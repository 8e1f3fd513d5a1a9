use core::ops::Range;
use serde::{Deserialize, Serialize};
use tilescan_runtime::config::EngineConfig;

use crate::{ElemType, ScanNumeric, ScanPrecision, ScanShape, buffer_bytes, max_tile_rows};

/// Direction and inclusivity of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanAttributes {
    /// Accumulate from the end of the axis towards its start.
    pub reverse: bool,
    /// Leave the element at each position out of its own sum.
    pub exclusive: bool,
}

impl ScanAttributes {
    pub fn inclusive() -> Self {
        Self::default()
    }

    pub fn exclusive() -> Self {
        Self {
            reverse: false,
            exclusive: true,
        }
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }
}

/// How a tile obtains the carry of the tiles streamed before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarryStrategy {
    /// A single buffer; each tile starts from the last row of the previous one.
    #[default]
    Running,
    /// `buffers` tiles are resident and scanned independently, their carries are formed from a
    /// [CarryCache](crate::CarryCache) of the previous tile totals.
    Cached { buffers: usize },
}

impl CarryStrategy {
    /// Number of tile-sized slots in the local buffer.
    pub fn slots(&self) -> usize {
        match self {
            CarryStrategy::Running => 1,
            CarryStrategy::Cached { buffers } => *buffers,
        }
    }
}

/// The work assigned to one core, as decided by the tiling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Outer rows.
    pub m: Range<usize>,
    /// Scanned rows.
    pub r: Range<usize>,
    /// Inner lanes.
    pub n: Range<usize>,
    /// Rows of `r` per tile.
    pub tile_rows: usize,
    /// Number of independently streamed segments `r` is split into inside the core.
    pub segments: usize,
    pub carry: CarryStrategy,
}

impl PartitionConfig {
    pub fn new(m: Range<usize>, r: Range<usize>, n: Range<usize>, tile_rows: usize) -> Self {
        Self {
            m,
            r,
            n,
            tile_rows,
            segments: 1,
            carry: CarryStrategy::Running,
        }
    }

    /// Whether the partition holds no element.
    pub fn is_empty(&self) -> bool {
        self.m.is_empty() || self.r.is_empty() || self.n.is_empty()
    }

    /// Number of elements of the partition.
    pub fn elems(&self) -> usize {
        self.m.len() * self.r.len() * self.n.len()
    }

    /// Segments effectively used: never more than the number of scanned rows.
    pub fn effective_segments(&self) -> usize {
        self.segments.min(self.r.len()).max(1)
    }

    /// Tile height actually streamed: a tile never holds more rows than a segment.
    pub fn effective_tile_rows(&self) -> usize {
        let segment_rows = self.r.len().div_ceil(self.effective_segments());
        self.tile_rows.min(segment_rows).max(1)
    }

    /// Size in bytes of the local buffer needed to stream this partition, accumulating in `acc`.
    /// `None` when the size overflows a `usize`.
    pub fn required_bytes(&self, acc: ElemType) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }

        let segments = self.effective_segments();
        let segment_rows = self.r.len().div_ceil(segments);
        let tile_rows = self.effective_tile_rows();
        buffer_bytes(
            acc.size(),
            self.n.len(),
            tile_rows,
            self.carry,
            segment_rows.div_ceil(tile_rows),
            segments,
        )
    }
}

/// The fixed record produced by the tiling: shape, attributes, types and one partition per core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilingConfig {
    pub shape: ScanShape,
    pub attributes: ScanAttributes,
    /// Type of the scanned elements.
    pub elem: ElemType,
    /// Type the elements are accumulated in.
    pub acc: ElemType,
    /// Byte budget of each core's local buffer.
    pub ub_bytes: usize,
    /// One partition per core, indexed by core.
    pub partitions: Vec<PartitionConfig>,
}

impl TilingConfig {
    pub fn new<P: ScanPrecision>(
        shape: ScanShape,
        attributes: ScanAttributes,
        ub_bytes: usize,
        partitions: Vec<PartitionConfig>,
    ) -> Self {
        Self {
            shape,
            attributes,
            elem: P::EI::ELEM,
            acc: P::EA::ELEM,
            ub_bytes,
            partitions,
        }
    }

    /// Split the scanned axis in `cores` contiguous ranges, each covering every outer row and
    /// inner lane. Trailing cores receive empty ranges when `cores > shape.r`.
    pub fn split_scan_axis<P: ScanPrecision>(
        shape: ScanShape,
        attributes: ScanAttributes,
        cores: usize,
        tile_rows: usize,
    ) -> Self {
        let partitions = split_range(shape.r, cores)
            .map(|r| PartitionConfig::new(0..shape.m, r, 0..shape.n, tile_rows))
            .collect();

        Self::new::<P>(shape, attributes, EngineConfig::default().ub_bytes, partitions)
    }

    /// Split the outer rows in `cores` contiguous ranges, each scanning the whole axis.
    pub fn split_outer<P: ScanPrecision>(
        shape: ScanShape,
        attributes: ScanAttributes,
        cores: usize,
        tile_rows: usize,
    ) -> Self {
        let partitions = split_range(shape.m, cores)
            .map(|m| PartitionConfig::new(m, 0..shape.r, 0..shape.n, tile_rows))
            .collect();

        Self::new::<P>(shape, attributes, EngineConfig::default().ub_bytes, partitions)
    }

    /// A reasonable tiling for `shape` using the core count and buffer budget of `engine`.
    ///
    /// Outer rows are split across cores when there are enough of them, the scanned axis
    /// otherwise. Tiles are as tall as the buffer budget allows.
    pub fn generate<P: ScanPrecision>(
        shape: ScanShape,
        attributes: ScanAttributes,
        engine: &EngineConfig,
    ) -> Self {
        let cores = engine.core_count().max(1);
        let budget_rows = max_tile_rows(P::EA::ELEM.size(), shape.n, engine.ub_bytes).max(1);

        let config = if shape.m >= cores || shape.r <= 1 {
            let tile_rows = budget_rows.min(shape.r.max(1));
            Self::split_outer::<P>(shape, attributes, cores.min(shape.m.max(1)), tile_rows)
        } else {
            let cores = cores.min(shape.r);
            let tile_rows = budget_rows.min(shape.r.div_ceil(cores));
            Self::split_scan_axis::<P>(shape, attributes, cores, tile_rows)
        };

        config.with_ub_bytes(engine.ub_bytes)
    }

    /// Number of cores.
    pub fn cores(&self) -> usize {
        self.partitions.len()
    }

    /// The largest local buffer needed by any partition, `usize::MAX` when it overflows.
    pub fn required_ub_bytes(&self) -> usize {
        self.partitions
            .iter()
            .map(|partition| partition.required_bytes(self.acc).unwrap_or(usize::MAX))
            .max()
            .unwrap_or(0)
    }

    pub fn with_tile_rows(mut self, tile_rows: usize) -> Self {
        self.partitions
            .iter_mut()
            .for_each(|partition| partition.tile_rows = tile_rows);
        self
    }

    pub fn with_segments(mut self, segments: usize) -> Self {
        self.partitions
            .iter_mut()
            .for_each(|partition| partition.segments = segments);
        self
    }

    pub fn with_carry(mut self, carry: CarryStrategy) -> Self {
        self.partitions
            .iter_mut()
            .for_each(|partition| partition.carry = carry);
        self
    }

    pub fn with_ub_bytes(mut self, ub_bytes: usize) -> Self {
        self.ub_bytes = ub_bytes;
        self
    }

    /// Use exactly the buffer budget the partitions need.
    pub fn with_fitted_ub_bytes(self) -> Self {
        let ub_bytes = self.required_ub_bytes();
        self.with_ub_bytes(ub_bytes)
    }
}

fn split_range(len: usize, parts: usize) -> impl Iterator<Item = Range<usize>> {
    let chunk = len.div_ceil(parts.max(1));
    (0..parts).map(move |part| (part * chunk).min(len)..((part + 1) * chunk).min(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_axis_split_leaves_trailing_cores_empty() {
        let config = TilingConfig::split_scan_axis::<i32>(
            ScanShape::new(2, 5, 3),
            ScanAttributes::inclusive(),
            4,
            2,
        );

        let ranges: Vec<_> = config.partitions.iter().map(|p| p.r.clone()).collect();
        assert_eq!(ranges, vec![0..2, 2..4, 4..5, 5..5]);
        assert!(config.partitions[3].is_empty());
        assert_eq!(config.elem, ElemType::I32);
    }

    #[test]
    fn outer_split_scans_the_whole_axis() {
        let config = TilingConfig::split_outer::<half::f16>(
            ScanShape::new(6, 5, 3),
            ScanAttributes::exclusive(),
            3,
            2,
        );

        assert!(config.partitions.iter().all(|p| p.r == (0..5)));
        assert_eq!(config.partitions[2].m, 4..6);
        assert_eq!(config.acc, ElemType::F32);
    }

    #[test]
    fn segments_never_exceed_rows() {
        let partition = PartitionConfig::new(0..1, 0..3, 0..1, 1);
        assert_eq!(
            PartitionConfig {
                segments: 8,
                ..partition.clone()
            }
            .effective_segments(),
            3
        );
        assert_eq!(partition.effective_segments(), 1);
    }

    #[test]
    fn generated_tiling_fits_the_budget() {
        let engine = EngineConfig {
            cores: Some(4),
            ub_bytes: 16 * 1024,
            ..Default::default()
        };
        let config = TilingConfig::generate::<f32>(
            ScanShape::new(1, 10_000, 16),
            ScanAttributes::inclusive(),
            &engine,
        );

        assert_eq!(config.cores(), 4);
        assert!(config.required_ub_bytes() <= engine.ub_bytes);
        assert!(config.partitions[0].tile_rows > 1);
    }

    #[test]
    fn generated_tiles_span_the_rows_of_a_partition() {
        let engine = EngineConfig {
            cores: Some(4),
            ub_bytes: 1 << 20,
            ..Default::default()
        };

        let outer = TilingConfig::generate::<f32>(
            ScanShape::new(8, 1000, 4),
            ScanAttributes::inclusive(),
            &engine,
        );
        assert!(outer.partitions.iter().all(|p| p.r == (0..1000)));
        assert!(outer.partitions.iter().all(|p| p.tile_rows == 1000));

        let scan_axis = TilingConfig::generate::<f32>(
            ScanShape::new(1, 1000, 4),
            ScanAttributes::inclusive(),
            &engine,
        );
        assert!(scan_axis.partitions.iter().all(|p| p.tile_rows == 250));
    }

    #[test]
    fn tiles_never_outgrow_a_segment() {
        let partition = PartitionConfig {
            segments: 2,
            ..PartitionConfig::new(0..1, 0..7, 0..1, usize::MAX / 2)
        };

        assert_eq!(partition.effective_tile_rows(), 4);
        assert!(partition.required_bytes(ElemType::I32).is_some());
    }
}
