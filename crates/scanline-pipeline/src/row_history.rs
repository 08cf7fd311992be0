//! Row history (line buffer): rebuilds a vertical pixel column from a
//! row-major sample stream.
//!
//! A [`RowHistory`] for kernel size `K` keeps the last `K - 1` rows of the
//! stream. Every cycle it accepts the next sample, emits the `K`-tall
//! column ending in that sample, and pushes the sample into a per-position
//! FIFO that is `K - 1` entries deep. This is the classic FPGA line buffer:
//! one block RAM per buffered row, one write cursor shared by all of them.

use crate::types::{PipelineError, Sample};

/// The `K - 1` most recent rows of a sample stream.
///
/// Storage is one contiguous buffer of `(K - 1) * width` samples indexed
/// by `(row, position)`. Row 0 is the oldest buffered row, row `K - 2` the
/// most recent. All rows start zeroed.
#[derive(Debug, Clone)]
pub struct RowHistory {
    width: usize,
    kernel_size: usize,
    rows: Vec<Sample>,
    column: Vec<Sample>,
    cursor: usize,
    completed_rows: usize,
}

/// The column emitted by one [`RowHistory::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column<'a> {
    /// `K` samples, oldest row first; the last entry is the incoming sample.
    pub samples: &'a [Sample],
    /// Whether `K - 1` full rows have passed through the history, counting
    /// the row this call may have just completed. Same value as
    /// [`RowHistory::is_ready`] right after the call.
    pub ready: bool,
}

impl RowHistory {
    /// Create an empty history for rows of `width` samples and a
    /// `kernel_size`-tall column.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidKernelSize`] if `kernel_size` is zero
    /// or even, and [`PipelineError::InvalidDimensions`] if `width` is zero.
    pub fn new(width: u32, kernel_size: usize) -> Result<Self, PipelineError> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidKernelSize(kernel_size));
        }
        if width == 0 {
            return Err(PipelineError::InvalidDimensions { width, height: 0 });
        }
        let width = width as usize;
        Ok(Self {
            width,
            kernel_size,
            rows: vec![0; (kernel_size - 1) * width],
            column: vec![0; kernel_size],
            cursor: 0,
            completed_rows: 0,
        })
    }

    /// Accept one sample at the current horizontal position.
    ///
    /// Returns the column at that position: the `K - 1` buffered samples
    /// (oldest first) followed by `incoming`. The buffered rows then shift
    /// up by one at this position and `incoming` becomes the most recent
    /// entry. The cursor advances and wraps every `width` calls.
    pub fn advance(&mut self, incoming: Sample) -> Column<'_> {
        let depth = self.kernel_size - 1;
        let at = self.cursor;

        for row in 0..depth {
            self.column[row] = self.rows[row * self.width + at];
        }
        self.column[depth] = incoming;

        if depth > 0 {
            for row in 0..depth - 1 {
                self.rows[row * self.width + at] = self.rows[(row + 1) * self.width + at];
            }
            self.rows[(depth - 1) * self.width + at] = incoming;
        }

        self.cursor += 1;
        if self.cursor == self.width {
            self.cursor = 0;
            if self.completed_rows < self.kernel_size {
                self.completed_rows += 1;
            }
            log::trace!(
                "row history: end of line, completed_rows={}",
                self.completed_rows
            );
        }

        Column {
            ready: self.is_ready(),
            samples: &self.column,
        }
    }

    /// Current write position in `[0, width)`.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of full rows seen so far, saturating at `K`.
    #[must_use]
    pub const fn completed_rows(&self) -> usize {
        self.completed_rows
    }

    /// Whether at least `K - 1` full rows have been consumed.
    ///
    /// Turns true on the call that completes row `K - 1`, that is on call
    /// `(K - 1) * W` counting from one, and stays true. The column emitted
    /// on that call still holds one zeroed entry per position of the
    /// oldest row; every later column is made of stream samples only.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.completed_rows + 1 >= self.kernel_size
    }

    /// Column height `K`.
    #[must_use]
    pub const fn kernel_size(&self) -> usize {
        self.kernel_size
    }
}
