use crate::{ScanNumeric, TileMut};

/// Sklansky scan along the rows of a tile.
///
/// At step `half = 1, 2, 4, ...`, rows are grouped by `2 * half` in scan order and the last row
/// of the first half of each group is broadcast onto every row of its second half. Each step is
/// one vector addition per destination row, with no dependency between destinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oneway;

impl Oneway {
    pub fn scan<A: ScanNumeric>(tile: &mut TileMut<'_, A>, reverse: bool) {
        let rows = tile.rows();
        let mut half = 1;

        while half < rows {
            let group = 2 * half;
            let mut start = 0;

            while start + half < rows {
                let src = start + half - 1;
                let end = (start + group).min(rows);

                // Logical ranges map to contiguous storage ranges in both directions.
                match reverse {
                    false => tile.broadcast_add(src, start + half..end),
                    true => tile.broadcast_add(rows - 1 - src, rows - end..rows - start - half),
                }

                start += group;
            }

            half = group;
        }
    }
}
