use core::marker::PhantomData;
use core::ops::Range;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The (M, R, N) decomposition of a scanned tensor.
///
/// `m` counts the independent outer rows, `r` is the length of the scanned axis and `n` the
/// number of independent inner lanes. The layout is row-major: strides are `r * n`, `n` and `1`.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanShape {
    pub m: usize,
    pub r: usize,
    pub n: usize,
}

impl ScanShape {
    /// Fold a contiguous tensor of shape `dims` scanned along `axis`.
    pub fn from_axis(dims: &[usize], axis: usize) -> Result<Self, ConfigError> {
        let rank = dims.len();
        if axis >= rank {
            return Err(ConfigError::AxisOutOfBounds { axis, rank });
        }

        Ok(Self {
            m: dims[..axis].iter().product(),
            r: dims[axis],
            n: dims[axis + 1..].iter().product(),
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.m * self.r * self.n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index of the element at (m, r, n).
    #[inline(always)]
    pub fn offset(&self, m: usize, r: usize, n: usize) -> usize {
        (m * self.r + r) * self.n + n
    }
}

/// Immutable view over the input tensor.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a, E> {
    data: &'a [E],
    shape: ScanShape,
}

impl<'a, E> TensorView<'a, E> {
    /// The caller guarantees `data.len() == shape.len()`.
    pub(crate) fn new(data: &'a [E], shape: ScanShape) -> Self {
        debug_assert_eq!(data.len(), shape.len());
        Self { data, shape }
    }

    /// The lanes `lanes` of row `r` of outer row `m`.
    #[inline]
    pub fn row(&self, m: usize, r: usize, lanes: Range<usize>) -> &'a [E] {
        let start = self.shape.offset(m, r, lanes.start);
        &self.data[start..start + lanes.len()]
    }

    pub fn shape(&self) -> ScanShape {
        self.shape
    }
}

/// The output tensor, shared by every core of a run.
///
/// Cores write through row slices; a validated [ScanPlan](crate::ScanPlan) guarantees that the
/// partitions, and therefore the rows handed out to different cores, never overlap.
#[derive(Debug)]
pub struct SharedOutput<'a, E> {
    ptr: *mut E,
    len: usize,
    shape: ScanShape,
    _borrow: PhantomData<&'a mut [E]>,
}

unsafe impl<E: Send> Send for SharedOutput<'_, E> {}
unsafe impl<E: Send> Sync for SharedOutput<'_, E> {}

impl<'a, E> SharedOutput<'a, E> {
    /// The caller guarantees `data.len() == shape.len()`.
    pub(crate) fn new(data: &'a mut [E], shape: ScanShape) -> Self {
        debug_assert_eq!(data.len(), shape.len());
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            shape,
            _borrow: PhantomData,
        }
    }

    /// The lanes `lanes` of row `r` of outer row `m`.
    ///
    /// # Safety
    ///
    /// The returned slice must not alias any other live slice handed out by this output, which
    /// holds as long as every core only touches rows of its own partition.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn row_mut(&self, m: usize, r: usize, lanes: Range<usize>) -> &mut [E] {
        let start = self.shape.offset(m, r, lanes.start);
        assert!(start + lanes.len() <= self.len, "Row out of bounds");
        unsafe { core::slice::from_raw_parts_mut(self.ptr.add(start), lanes.len()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_folding() {
        let shape = ScanShape::from_axis(&[2, 3, 4, 5], 2).unwrap();
        assert_eq!(shape, ScanShape::new(6, 4, 5));

        let shape = ScanShape::from_axis(&[7], 0).unwrap();
        assert_eq!(shape, ScanShape::new(1, 7, 1));

        assert!(matches!(
            ScanShape::from_axis(&[7], 1),
            Err(ConfigError::AxisOutOfBounds { axis: 1, rank: 1 })
        ));
    }

    #[test]
    fn row_major_offsets() {
        let shape = ScanShape::new(2, 3, 4);
        assert_eq!(shape.offset(0, 0, 0), 0);
        assert_eq!(shape.offset(0, 1, 0), 4);
        assert_eq!(shape.offset(1, 0, 0), 12);
        assert_eq!(shape.offset(1, 2, 3), 23);
        assert_eq!(shape.len(), 24);
    }

    #[test]
    fn views_hand_out_lane_ranges() {
        let shape = ScanShape::new(1, 2, 3);
        let data = [0, 1, 2, 3, 4, 5];
        let view = TensorView::new(&data, shape);
        assert_eq!(view.row(0, 1, 1..3), &[4, 5]);

        let mut out = [0; 6];
        let output = SharedOutput::new(&mut out, shape);
        unsafe { output.row_mut(0, 1, 0..2) }.copy_from_slice(&[9, 8]);
        assert_eq!(out, [0, 0, 0, 9, 8, 0]);
    }
}
