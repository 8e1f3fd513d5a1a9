use derive_new::new;
use num_traits::Zero;

use crate::{MAX_FOLD, Oneway, ScanNumeric, TileMut, add_lanes};

/// Folded scan of a tile too short to fill a vector.
///
/// The `k` rows are split, in scan order, into `fold` chunks of `ceil(k / fold)` rows laid side by
/// side so one vector covers `fold * lanes` values. The chunks are scanned together with the
/// [Oneway] network, the chunk totals are scanned on their own, and each chunk but the first gets
/// the total of the chunks before it while being unfolded.
#[derive(new, Debug, Clone, Copy)]
pub struct Twoway {
    fold: usize,
}

impl Twoway {
    pub fn scan<A: ScanNumeric>(&self, tile: &mut TileMut<'_, A>, reverse: bool, scratch: &mut Vec<A>) {
        let rows = tile.rows();
        let lanes = tile.lanes();
        let fold = self.fold.min(MAX_FOLD).clamp(1, rows.max(1));

        if fold == 1 {
            return Oneway::scan(tile, reverse);
        }

        let depth = rows.div_ceil(fold);
        let width = fold * lanes;

        scratch.clear();
        scratch.resize(depth * width + fold * lanes, A::zero());
        let (folded, totals) = scratch.split_at_mut(depth * width);

        for logical in 0..rows {
            let (chunk, row) = (logical / depth, logical % depth);
            folded[row * width + chunk * lanes..][..lanes]
                .copy_from_slice(tile.row(tile.physical(logical, reverse)));
        }

        Oneway::scan(&mut TileMut::new(folded, depth, width, width), false);

        for chunk in 0..fold {
            totals[chunk * lanes..][..lanes]
                .copy_from_slice(&folded[(depth - 1) * width + chunk * lanes..][..lanes]);
        }
        Oneway::scan(&mut TileMut::new(totals, fold, lanes, lanes), false);

        for logical in 0..rows {
            let (chunk, row) = (logical / depth, logical % depth);
            let physical = tile.physical(logical, reverse);
            let dst = tile.row_mut(physical);

            dst.copy_from_slice(&folded[row * width + chunk * lanes..][..lanes]);
            if chunk > 0 {
                add_lanes(dst, &totals[(chunk - 1) * lanes..][..lanes]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::test_utils::*;

    #[test]
    fn matches_sequential_scan() {
        let mut scratch = Vec::new();

        for rows in 1..40 {
            for fold in [2, 3, 8] {
                for (lanes, stride) in [(1, 1), (3, 8), (4, 4)] {
                    for reverse in [false, true] {
                        let mut actual = tile_data(rows, lanes, stride, (rows * fold) as u64);
                        let mut expected = actual.clone();

                        Twoway::new(fold).scan(
                            &mut TileMut::new(&mut actual, rows, lanes, stride),
                            reverse,
                            &mut scratch,
                        );
                        sequential(&mut TileMut::new(&mut expected, rows, lanes, stride), reverse);

                        assert_eq!(
                            actual, expected,
                            "rows {rows}, fold {fold}, lanes {lanes}, reverse {reverse}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn short_tiles_with_empty_chunks() {
        // 9 rows in 8 chunks of 2 rows: the last three chunks hold no row.
        let mut data: Vec<i32> = (1..=9).collect();
        let mut scratch = Vec::new();

        Twoway::new(8).scan(&mut TileMut::new(&mut data, 9, 1, 1), false, &mut scratch);
        assert_eq!(data, vec![1, 3, 6, 10, 15, 21, 28, 36, 45]);
    }

    #[test]
    fn fold_is_bounded_by_the_scratch_rows() {
        let mut scratch = Vec::new();

        for rows in [7, 40, 300] {
            let mut actual = tile_data(rows, 4, 4, rows as u64);
            let mut expected = actual.clone();

            Twoway::new(1000).scan(&mut TileMut::new(&mut actual, rows, 4, 4), false, &mut scratch);
            sequential(&mut TileMut::new(&mut expected, rows, 4, 4), false);

            assert_eq!(actual, expected, "rows {rows}");
            assert!(scratch.len() <= (rows + 2 * MAX_FOLD) * 4);
        }
    }
}
