//! Carry propagation above the tile level.
//!
//! Inside a core, the scan range can be split into segments that are streamed independently
//! and then corrected with the totals of the segments before them. Across cores, every core of a
//! group publishes its trailing totals and is corrected with the sum of its upstream cores' ones.
//! Both levels follow the same three steps: scan from a zero carry, exchange totals, correct.

use core::ops::Range;
use num_traits::Zero;
use tilescan_runtime::{BarrierError, BoardView};

use crate::{
    CarryCache, NetworkSelector, Partition, ScanNumeric, ScanPrecision, SharedOutput, TensorView,
    TileStreamer, add_lanes,
};

/// Local scan of a whole partition.
///
/// Returns the trailing totals of the partition, one row of lanes per outer row. They are zero
/// for a partition without rows.
pub(crate) fn scan_partition<P: ScanPrecision, S: NetworkSelector>(
    streamer: &mut TileStreamer<'_, P, S>,
    input: &TensorView<'_, P::EI>,
    output: &SharedOutput<'_, P::EI>,
) -> Vec<P::EA> {
    let partition = streamer.partition();
    let mut totals = vec![P::EA::zero(); partition.totals_len()];
    if partition.is_empty() {
        return totals;
    }

    let lanes = partition.n.len();
    let segments = segments(
        partition.r.clone(),
        partition.segments,
        streamer.attributes().reverse,
    );

    if segments.len() == 1 {
        for (row, m) in partition.m.clone().enumerate() {
            let total = &mut totals[row * lanes..][..lanes];
            streamer.scan_rows(input, output, m, partition.r.clone(), total);
        }
        return totals;
    }

    log::trace!(
        "Core {} streams {} segments of rows {:?}",
        partition.core,
        segments.len(),
        partition.r
    );

    let mut segment_totals = vec![P::EA::zero(); segments.len() * lanes];
    let mut cache = CarryCache::with_capacity(lanes, segments.len());
    let mut carry = vec![P::EA::zero(); lanes];

    for (row, m) in partition.m.clone().enumerate() {
        for (segment, rows) in segments.iter().enumerate() {
            let total = &mut segment_totals[segment * lanes..][..lanes];
            streamer.scan_rows(input, output, m, rows.clone(), total);
        }

        cache.reset();
        for (segment, rows) in segments.iter().enumerate() {
            if segment > 0 {
                cache.carry_into(&mut carry);
                streamer.correct_rows(output, m, rows.clone(), &carry);
            }
            cache.push(&segment_totals[segment * lanes..][..lanes]);
        }

        cache.carry_into(&mut totals[row * lanes..][..lanes]);
    }

    totals
}

/// The sum of the totals published by the upstream cores of `partition`, `None` when there is
/// nothing to correct.
pub(crate) fn upstream_correction<A: ScanNumeric>(
    partition: &Partition,
    board: &BoardView<'_, A>,
) -> Result<Option<Vec<A>>, BarrierError> {
    if partition.is_empty() || partition.upstream.is_empty() {
        return Ok(None);
    }

    let mut correction = vec![A::zero(); partition.totals_len()];
    for core in partition.upstream.iter() {
        let totals = board.totals(*core)?;
        if totals.len() != correction.len() {
            return Err(BarrierError::MissingTotals { core: *core });
        }
        add_lanes(&mut correction, totals);
    }

    Ok(Some(correction))
}

/// Add the upstream correction to every element of the partition.
pub(crate) fn apply_correction<P: ScanPrecision, S: NetworkSelector>(
    streamer: &mut TileStreamer<'_, P, S>,
    output: &SharedOutput<'_, P::EI>,
    correction: &[P::EA],
) {
    let partition = streamer.partition();
    let lanes = partition.n.len();

    for (row, m) in partition.m.clone().enumerate() {
        let correction = &correction[row * lanes..][..lanes];
        streamer.correct_rows(output, m, partition.r.clone(), correction);
    }

    streamer.report_mut().upstream = partition.upstream.len();
}

/// Split `rows` into at most `count` contiguous segments, in scan order.
fn segments(rows: Range<usize>, count: usize, reverse: bool) -> Vec<Range<usize>> {
    let size = rows.len().div_ceil(count.max(1)).max(1);
    let mut segments: Vec<Range<usize>> = (rows.start..rows.end)
        .step_by(size)
        .map(|start| start..(start + size).min(rows.end))
        .collect();

    if reverse {
        segments.reverse();
    }
    segments
}
