use core::ops::Range;
use num_traits::Zero;

use crate::{CarryStrategy, MAX_FOLD, ScanNumeric, levels_for};

/// Rows of the local buffer are padded to a multiple of this many bytes.
pub const ALIGN_BYTES: usize = 32;

/// Number of elements of a padded row of `lanes` elements of `elem_size` bytes.
pub fn padded_lanes(elem_size: usize, lanes: usize) -> usize {
    let align = (ALIGN_BYTES / elem_size.max(1)).max(1);
    lanes.div_ceil(align).saturating_mul(align)
}

/// Bytes of local buffer needed to stream tiles of `tile_rows` rows of `lanes` lanes, `None`
/// when the size does not fit in a `usize`.
///
/// Counts the tile slots, the folding scratch of the two-way network, the carry and spare rows,
/// the tile-level carry cache when carries are cached, and the segment totals with their cache
/// when the scan range is split into segments.
pub fn buffer_bytes(
    elem_size: usize,
    lanes: usize,
    tile_rows: usize,
    carry: CarryStrategy,
    tiles_per_segment: usize,
    segments: usize,
) -> Option<usize> {
    let tile_cache = match carry {
        CarryStrategy::Running => 0,
        CarryStrategy::Cached { .. } => levels_for(tiles_per_segment) + 1,
    };
    let segment_cache = match segments {
        0 | 1 => 0,
        segments => segments.checked_add(levels_for(segments) + 1)?,
    };
    let rows = carry
        .slots()
        .checked_mul(tile_rows)?
        .checked_add(tile_rows)?
        .checked_add(2 * MAX_FOLD + 2 + tile_cache)?
        .checked_add(segment_cache)?;

    rows.checked_mul(padded_lanes(elem_size, lanes))?
        .checked_mul(elem_size)
}

/// Tallest tile a single running buffer of `ub_bytes` can hold, `0` if not even one row fits.
pub fn max_tile_rows(elem_size: usize, lanes: usize, ub_bytes: usize) -> usize {
    let row_bytes = padded_lanes(elem_size, lanes) * elem_size;
    if row_bytes == 0 {
        return 0;
    }

    (ub_bytes / row_bytes).saturating_sub(2 * MAX_FOLD + 2) / 2
}

/// A resident tile: `rows` rows of `lanes` lanes, consecutive rows `stride` elements apart.
///
/// Rows are stored in ascending scan-axis order whatever the direction of the scan.
#[derive(Debug)]
pub struct TileMut<'a, A> {
    data: &'a mut [A],
    rows: usize,
    lanes: usize,
    stride: usize,
}

impl<'a, A: ScanNumeric> TileMut<'a, A> {
    pub fn new(data: &'a mut [A], rows: usize, lanes: usize, stride: usize) -> Self {
        assert!(lanes <= stride, "Lanes must fit in the row stride");
        assert!(data.len() >= rows * stride, "Tile data is too short");

        Self {
            data,
            rows,
            lanes,
            stride,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[A] {
        &self.data[row * self.stride..][..self.lanes]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [A] {
        &mut self.data[row * self.stride..][..self.lanes]
    }

    /// Storage row of the `logical`-th row in scan order.
    #[inline(always)]
    pub fn physical(&self, logical: usize, reverse: bool) -> usize {
        match reverse {
            true => self.rows - 1 - logical,
            false => logical,
        }
    }

    /// Row holding the total of the tile once it is scanned.
    pub fn scan_end(&self, reverse: bool) -> usize {
        self.physical(self.rows.saturating_sub(1), reverse)
    }

    /// Add storage row `src` to every storage row of `dst`, which must not contain `src`.
    pub(crate) fn broadcast_add(&mut self, src: usize, dst: Range<usize>) {
        debug_assert!(!dst.contains(&src));
        let (lanes, stride) = (self.lanes, self.stride);

        if src < dst.start {
            let (head, tail) = self.data.split_at_mut(dst.start * stride);
            let src = &head[src * stride..][..lanes];
            for row in tail.chunks_mut(stride).take(dst.len()) {
                add_lanes(&mut row[..lanes], src);
            }
        } else {
            let (head, tail) = self.data.split_at_mut(src * stride);
            let src = &tail[..lanes];
            for row in head[dst.start * stride..].chunks_mut(stride).take(dst.len()) {
                add_lanes(&mut row[..lanes], src);
            }
        }
    }

    /// Add `values` to every row.
    pub fn add_to_rows(&mut self, values: &[A]) {
        for row in 0..self.rows {
            add_lanes(self.row_mut(row), values);
        }
    }
}

#[inline(always)]
pub(crate) fn add_lanes<A: ScanNumeric>(dst: &mut [A], src: &[A]) {
    for (dst, src) in dst.iter_mut().zip(src) {
        *dst = dst.combine(*src);
    }
}

/// Fast memory owned by one core.
#[derive(Debug)]
pub struct LocalBuffer<A> {
    lanes: usize,
    stride: usize,
    tile_rows: usize,
    slots: usize,
    tiles: Vec<A>,
    fold: Vec<A>,
    carry: Vec<A>,
    spare: Vec<A>,
}

/// Disjoint borrows of one tile slot and the shared rows of a [LocalBuffer].
pub struct TileParts<'a, A> {
    pub tile: TileMut<'a, A>,
    /// Scratch space of the two-way network.
    pub fold: &'a mut Vec<A>,
    /// Running carry.
    pub carry: &'a mut [A],
    pub spare: &'a mut [A],
}

impl<A: ScanNumeric> LocalBuffer<A> {
    pub fn new(lanes: usize, tile_rows: usize, slots: usize) -> Self {
        let stride = padded_lanes(size_of::<A>(), lanes);

        Self {
            lanes,
            stride,
            tile_rows,
            slots,
            tiles: vec![A::zero(); slots * tile_rows * stride],
            fold: Vec::with_capacity((tile_rows + 2 * MAX_FOLD) * lanes),
            carry: vec![A::zero(); lanes],
            spare: vec![A::zero(); lanes],
        }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Borrow the first `rows` rows of tile slot `slot`.
    pub fn parts(&mut self, slot: usize, rows: usize) -> TileParts<'_, A> {
        assert!(slot < self.slots, "Slot {slot} out of {}", self.slots);
        assert!(rows <= self.tile_rows, "Tiles hold at most {} rows", self.tile_rows);

        let slot_len = self.tile_rows * self.stride;
        let data = &mut self.tiles[slot * slot_len..][..rows * self.stride];

        TileParts {
            tile: TileMut::new(data, rows, self.lanes, self.stride),
            fold: &mut self.fold,
            carry: &mut self.carry,
            spare: &mut self.spare,
        }
    }

    pub fn carry(&self) -> &[A] {
        &self.carry
    }

    pub fn reset_carry(&mut self) {
        self.carry.fill(A::zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_the_alignment() {
        assert_eq!(padded_lanes(4, 1), 8);
        assert_eq!(padded_lanes(4, 8), 8);
        assert_eq!(padded_lanes(4, 9), 16);
        assert_eq!(padded_lanes(8, 5), 8);
        assert_eq!(padded_lanes(2, 3), 16);
    }

    #[test]
    fn max_tile_rows_fits_the_running_layout() {
        let ub_bytes = 4096;
        let rows = max_tile_rows(4, 3, ub_bytes);

        assert!(rows > 0);
        assert!(buffer_bytes(4, 3, rows, CarryStrategy::Running, 1, 1).unwrap() <= ub_bytes);
        assert!(buffer_bytes(4, 3, rows + 1, CarryStrategy::Running, 1, 1).unwrap() > ub_bytes);
        assert_eq!(max_tile_rows(4, 1024, 64), 0);
    }

    #[test]
    fn cached_carries_need_more_room() {
        let running = buffer_bytes(4, 8, 16, CarryStrategy::Running, 9, 1).unwrap();
        let cached = buffer_bytes(4, 8, 16, CarryStrategy::Cached { buffers: 2 }, 9, 1).unwrap();
        let segmented = buffer_bytes(4, 8, 16, CarryStrategy::Running, 9, 4).unwrap();

        assert_eq!(cached - running, (16 + levels_for(9) + 1) * 8 * 4);
        assert!(segmented > running);
    }

    #[test]
    fn oversized_layouts_do_not_overflow() {
        assert_eq!(
            buffer_bytes(4, 1, usize::MAX / 2, CarryStrategy::Running, 1, 1),
            None
        );
        assert_eq!(
            buffer_bytes(4, 1, 2, CarryStrategy::Cached { buffers: usize::MAX }, 1, 1),
            None
        );
        assert_eq!(
            buffer_bytes(8, usize::MAX / 4, 1, CarryStrategy::Running, 1, 1),
            None
        );
    }

    #[test]
    fn broadcast_in_both_directions() {
        let mut data = vec![1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 0, 0];
        let mut tile = TileMut::new(&mut data, 3, 2, 4);

        tile.broadcast_add(0, 1..3);
        assert_eq!(tile.row(1), &[6, 8]);
        assert_eq!(tile.row(2), &[8, 10]);

        tile.broadcast_add(2, 0..1);
        assert_eq!(tile.row(0), &[9, 12]);
        // Padding lanes are never touched.
        assert_eq!(&data[2..4], &[3, 4]);
    }

    #[test]
    fn slots_do_not_overlap() {
        let mut buffer = LocalBuffer::<i32>::new(3, 2, 2);
        buffer.parts(0, 2).tile.add_to_rows(&[1, 1, 1]);

        let parts = buffer.parts(1, 2);
        assert_eq!(parts.tile.row(0), &[0, 0, 0]);
        assert_eq!(parts.tile.row(1), &[0, 0, 0]);
    }
}
