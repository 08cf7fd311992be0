//! Sliding `K x K` neighbourhood fed one column per cycle.

use crate::types::{PipelineError, Sample};

/// A `K x K` window of samples, shifted left by one column per cycle.
///
/// Column `j` holds samples `K - 1 - j` cycles older than the newest
/// column, so column `K - 1` is always the column inserted last. Rows are
/// ordered like the [`RowHistory`](crate::RowHistory) column: row 0 is the
/// oldest stream row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    kernel_size: usize,
    cells: Vec<Sample>,
}

impl SlidingWindow {
    /// Create a zeroed window.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidKernelSize`] if `kernel_size` is zero
    /// or even.
    pub fn new(kernel_size: usize) -> Result<Self, PipelineError> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidKernelSize(kernel_size));
        }
        Ok(Self {
            kernel_size,
            cells: vec![0; kernel_size * kernel_size],
        })
    }

    /// Shift every row one column left and insert `column` on the right.
    ///
    /// `column` must hold exactly `K` samples, oldest row first.
    pub fn shift(&mut self, column: &[Sample]) {
        debug_assert_eq!(column.len(), self.kernel_size, "column height mismatch");
        let k = self.kernel_size;
        for (row, &incoming) in self.cells.chunks_exact_mut(k).zip(column) {
            row.copy_within(1.., 0);
            row[k - 1] = incoming;
        }
    }

    /// Sample at `(row, col)`, both in `[0, K)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Sample {
        self.cells[row * self.kernel_size + col]
    }

    /// One window row, oldest column first.
    #[must_use]
    pub fn row(&self, row: usize) -> &[Sample] {
        let k = self.kernel_size;
        &self.cells[row * k..(row + 1) * k]
    }

    /// Side length `K`.
    #[must_use]
    pub const fn kernel_size(&self) -> usize {
        self.kernel_size
    }
}
