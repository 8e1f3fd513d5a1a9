use num_traits::Zero;

use crate::{ScanNumeric, add_lanes};

/// Number of levels a [CarryCache] holds after `pushes` pushes.
pub fn levels_for(pushes: usize) -> usize {
    (usize::BITS - pushes.leading_zeros()) as usize
}

/// Partial sums of the tile totals pushed so far, organised like a binary counter.
///
/// After `k` pushes, level `b` is occupied when bit `b` of `k` is set and holds the sum of a block
/// of `2^b` consecutive totals; higher levels hold earlier blocks. Pushing merges the occupied
/// low levels into the first free one, so blocks are always summed pairwise, and the carry of
/// the next tile is the sum of the occupied levels: both touch `O(log k)` rows.
#[derive(Debug, Clone)]
pub struct CarryCache<A> {
    lanes: usize,
    levels: Vec<A>,
    pushed: usize,
    scratch: Vec<A>,
}

impl<A: ScanNumeric> CarryCache<A> {
    pub fn new(lanes: usize) -> Self {
        Self::with_capacity(lanes, 0)
    }

    /// A cache that can take `pushes` pushes without growing.
    pub fn with_capacity(lanes: usize, pushes: usize) -> Self {
        Self {
            lanes,
            levels: Vec::with_capacity(levels_for(pushes) * lanes),
            pushed: 0,
            scratch: vec![A::zero(); lanes],
        }
    }

    /// Number of totals pushed since the last reset.
    pub fn len(&self) -> usize {
        self.pushed
    }

    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }

    /// Number of levels currently allocated.
    pub fn levels(&self) -> usize {
        self.levels.len() / self.lanes.max(1)
    }

    pub fn reset(&mut self) {
        self.pushed = 0;
    }

    /// Record the total of the next tile in scan order.
    pub fn push(&mut self, total: &[A]) {
        debug_assert_eq!(total.len(), self.lanes);
        let lanes = self.lanes;
        let level = self.pushed.trailing_ones() as usize;

        if self.levels.len() < (level + 1) * lanes {
            self.levels.resize((level + 1) * lanes, A::zero());
        }

        self.scratch.copy_from_slice(total);
        for below in 0..level {
            let block = &self.levels[below * lanes..][..lanes];
            for (acc, earlier) in self.scratch.iter_mut().zip(block) {
                *acc = earlier.combine(*acc);
            }
        }

        self.levels[level * lanes..][..lanes].copy_from_slice(&self.scratch);
        self.pushed += 1;
    }

    /// Write the sum of every total pushed so far into `out`.
    pub fn carry_into(&self, out: &mut [A]) {
        debug_assert_eq!(out.len(), self.lanes);
        out.fill(A::zero());

        for level in (0..levels_for(self.pushed)).rev() {
            if self.pushed & (1 << level) != 0 {
                add_lanes(out, &self.levels[level * self.lanes..][..self.lanes]);
            }
        }
    }
}
