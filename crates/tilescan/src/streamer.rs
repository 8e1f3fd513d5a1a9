use core::ops::Range;
use num_traits::Zero;

use crate::{
    CarryCache, CarryStrategy, CoreReport, LocalBuffer, NetworkSelector, Partition,
    ScanAttributes, ScanPrecision, SharedOutput, TensorView, TileMut, TileParts,
};

/// Streams the rows of one partition through its core's local buffer, tile by tile.
pub(crate) struct TileStreamer<'a, P: ScanPrecision, S> {
    partition: &'a Partition,
    attributes: ScanAttributes,
    scan_len: usize,
    selector: &'a S,
    buffer: LocalBuffer<P::EA>,
    cache: CarryCache<P::EA>,
    report: CoreReport,
}

impl<'a, P: ScanPrecision, S: NetworkSelector> TileStreamer<'a, P, S> {
    pub fn new(
        partition: &'a Partition,
        attributes: ScanAttributes,
        scan_len: usize,
        selector: &'a S,
    ) -> Self {
        let lanes = partition.n.len();
        let segment_rows = partition.r.len().div_ceil(partition.segments);

        Self {
            partition,
            attributes,
            scan_len,
            selector,
            buffer: LocalBuffer::new(lanes, partition.tile_rows, partition.carry.slots()),
            cache: CarryCache::with_capacity(lanes, segment_rows.div_ceil(partition.tile_rows)),
            report: CoreReport::new(partition.core),
        }
    }

    pub fn partition(&self) -> &'a Partition {
        self.partition
    }

    pub fn attributes(&self) -> ScanAttributes {
        self.attributes
    }

    pub fn report_mut(&mut self) -> &mut CoreReport {
        &mut self.report
    }

    pub fn into_report(self) -> CoreReport {
        self.report
    }

    /// Scan `rows` of outer row `m` starting from a zero carry, and write the sum of the rows
    /// into `total`.
    pub fn scan_rows(
        &mut self,
        input: &TensorView<'_, P::EI>,
        output: &SharedOutput<'_, P::EI>,
        m: usize,
        rows: Range<usize>,
        total: &mut [P::EA],
    ) {
        match self.partition.carry {
            CarryStrategy::Running => self.scan_running(input, output, m, rows, total),
            CarryStrategy::Cached { .. } => self.scan_cached(input, output, m, rows, total),
        }
    }

    fn scan_running(
        &mut self,
        input: &TensorView<'_, P::EI>,
        output: &SharedOutput<'_, P::EI>,
        m: usize,
        rows: Range<usize>,
        total: &mut [P::EA],
    ) {
        let reverse = self.attributes.reverse;
        let lanes = self.partition.n.clone();
        self.buffer.reset_carry();

        for span in tiles(rows, self.partition.tile_rows, reverse) {
            let network = self.selector.select(span.len(), lanes.len());
            self.report.record(network);
            log::trace!(
                "Core {} scans rows {span:?} of outer row {m} with {network:?}",
                self.partition.core
            );

            let TileParts {
                mut tile,
                fold,
                carry,
                ..
            } = self.buffer.parts(0, span.len());

            load::<P>(&mut tile, input, m, span.clone(), &lanes, self.attributes, self.scan_len);
            network.scan(&mut tile, reverse, fold);
            tile.add_to_rows(carry);
            store::<P>(&tile, output, m, span, &lanes);

            carry.copy_from_slice(tile.row(tile.scan_end(reverse)));
        }

        total.copy_from_slice(self.buffer.carry());
    }

    fn scan_cached(
        &mut self,
        input: &TensorView<'_, P::EI>,
        output: &SharedOutput<'_, P::EI>,
        m: usize,
        rows: Range<usize>,
        total: &mut [P::EA],
    ) {
        let reverse = self.attributes.reverse;
        let lanes = self.partition.n.clone();
        let spans: Vec<Range<usize>> = tiles(rows, self.partition.tile_rows, reverse).collect();
        self.cache.reset();

        for batch in spans.chunks(self.buffer.slots()) {
            // Every tile of the batch is scanned on its own first.
            for (slot, span) in batch.iter().enumerate() {
                let network = self.selector.select(span.len(), lanes.len());
                self.report.record(network);
                log::trace!(
                    "Core {} scans rows {span:?} of outer row {m} in slot {slot} with {network:?}",
                    self.partition.core
                );

                let TileParts { mut tile, fold, .. } = self.buffer.parts(slot, span.len());
                load::<P>(&mut tile, input, m, span.clone(), &lanes, self.attributes, self.scan_len);
                network.scan(&mut tile, reverse, fold);
            }

            for (slot, span) in batch.iter().enumerate() {
                let TileParts {
                    mut tile,
                    carry,
                    spare,
                    ..
                } = self.buffer.parts(slot, span.len());

                spare.copy_from_slice(tile.row(tile.scan_end(reverse)));
                self.cache.carry_into(carry);
                self.cache.push(spare);

                tile.add_to_rows(carry);
                store::<P>(&tile, output, m, span.clone(), &lanes);
            }
        }

        self.cache.carry_into(total);
    }

    /// Add `correction` to `rows` of outer row `m`, already written to the output.
    pub fn correct_rows(
        &mut self,
        output: &SharedOutput<'_, P::EI>,
        m: usize,
        rows: Range<usize>,
        correction: &[P::EA],
    ) {
        let lanes = self.partition.n.clone();

        for span in tiles(rows, self.partition.tile_rows, self.attributes.reverse) {
            let TileParts { mut tile, .. } = self.buffer.parts(0, span.len());

            for (row, r) in span.clone().enumerate() {
                // SAFETY: `r` and `lanes` belong to this core's partition.
                let written = unsafe { output.row_mut(m, r, lanes.clone()) };
                for (value, written) in tile.row_mut(row).iter_mut().zip(written.iter()) {
                    *value = P::promote(*written);
                }
            }

            tile.add_to_rows(correction);
            store::<P>(&tile, output, m, span, &lanes);
            self.report.correction_tiles += 1;
        }
    }
}

/// Tiles of at most `tile_rows` rows covering `rows`, in scan order.
///
/// A reverse scan starts from the end of the range, so only its last tile in scan order (the
/// one holding the first rows) may be short.
pub(crate) fn tiles(
    rows: Range<usize>,
    tile_rows: usize,
    reverse: bool,
) -> impl Iterator<Item = Range<usize>> {
    let count = rows.len().div_ceil(tile_rows);

    (0..count).map(move |index| match reverse {
        false => {
            let start = rows.start + index * tile_rows;
            start..(start + tile_rows).min(rows.end)
        }
        true => {
            let end = rows.end - index * tile_rows;
            end.saturating_sub(tile_rows).max(rows.start)..end
        }
    })
}

/// The input row read for output row `r`. Exclusive scans read the previous row in scan order,
/// and the first row of the axis reads zeros.
fn source_row(r: usize, attributes: ScanAttributes, scan_len: usize) -> Option<usize> {
    match (attributes.exclusive, attributes.reverse) {
        (false, _) => Some(r),
        (true, false) => r.checked_sub(1),
        (true, true) => (r + 1 < scan_len).then_some(r + 1),
    }
}

fn load<P: ScanPrecision>(
    tile: &mut TileMut<'_, P::EA>,
    input: &TensorView<'_, P::EI>,
    m: usize,
    span: Range<usize>,
    lanes: &Range<usize>,
    attributes: ScanAttributes,
    scan_len: usize,
) {
    for (row, r) in span.enumerate() {
        let dst = tile.row_mut(row);
        match source_row(r, attributes, scan_len) {
            Some(src) => {
                for (dst, src) in dst.iter_mut().zip(input.row(m, src, lanes.clone())) {
                    *dst = P::promote(*src);
                }
            }
            None => dst.fill(P::EA::zero()),
        }
    }
}

fn store<P: ScanPrecision>(
    tile: &TileMut<'_, P::EA>,
    output: &SharedOutput<'_, P::EI>,
    m: usize,
    span: Range<usize>,
    lanes: &Range<usize>,
) {
    for (row, r) in span.enumerate() {
        // SAFETY: `r` and `lanes` belong to the partition of the calling core.
        let dst = unsafe { output.row_mut(m, r, lanes.clone()) };
        for (dst, src) in dst.iter_mut().zip(tile.row(row)) {
            *dst = P::demote(*src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_follow_the_scan_order() {
        let forward: Vec<_> = tiles(3..10, 3, false).collect();
        assert_eq!(forward, vec![3..6, 6..9, 9..10]);

        let reverse: Vec<_> = tiles(3..10, 3, true).collect();
        assert_eq!(reverse, vec![7..10, 4..7, 3..4]);

        assert_eq!(tiles(5..5, 4, false).count(), 0);
    }

    #[test]
    fn exclusive_scans_read_shifted_rows() {
        let forward = ScanAttributes::exclusive();
        let reverse = forward.with_reverse(true);

        assert_eq!(source_row(0, forward, 4), None);
        assert_eq!(source_row(3, forward, 4), Some(2));
        assert_eq!(source_row(3, reverse, 4), None);
        assert_eq!(source_row(0, reverse, 4), Some(1));
        assert_eq!(source_row(2, ScanAttributes::inclusive(), 4), Some(2));
    }
}
