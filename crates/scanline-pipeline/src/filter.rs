//! Streaming 3x3 filters: one row history, one sliding window and a
//! [`Reduction`] per instance.
//!
//! A [`WindowFilter`] consumes one sample per cycle and produces one
//! [`Output`] per cycle. When the valid flag rises and which window the
//! output reduces depends on its [`Timing`].
//!
//! Under [`Timing::Aligned`] the latency is `radius * W + radius` cycles:
//! the output on cycle `t` belongs to the frame pixel at row-major index
//! `t - latency`, the pixel whose 3x3 neighbourhood was completed by the
//! sample arriving on cycle `t`. Neighbourhood taps outside the frame are
//! replaced by the nearest in-frame tap (clamp-to-edge). The replacement is
//! a selection among the window's own cells driven by the position
//! counters, the same mux a hardware border unit would place in front of
//! the kernel.
//!
//! Under [`Timing::Reference`] the filter behaves like a bare line buffer:
//! it is valid once the row history is ready and the row counter has
//! passed `radius`, and it reduces the window exactly as stored. The first
//! valid output arrives on cycle `(K - 1) * W - 1`.

use crate::kernel::{GradientMagnitude, KERNEL_SIZE, Reduction, Sharpening, Smoothing, Taps};
use crate::row_history::RowHistory;
use crate::types::{Dimensions, Output, PipelineError, Sample, Timing};
use crate::window::SlidingWindow;

/// Kernel radius, `K / 2`.
pub const RADIUS: usize = KERNEL_SIZE / 2;

/// A streaming 3x3 filter.
#[derive(Debug, Clone)]
pub struct WindowFilter<R> {
    reduction: R,
    dimensions: Dimensions,
    timing: Timing,
    history: RowHistory,
    window: SlidingWindow,
    x_cnt: u32,
    y_cnt: u64,
}

/// Streaming 3x3 box average.
pub type SmoothingFilter = WindowFilter<Smoothing>;

/// Streaming 3x3 sharpening.
pub type SharpeningFilter = WindowFilter<Sharpening>;

/// Streaming Sobel gradient magnitude.
pub type GradientFilter = WindowFilter<GradientMagnitude>;

impl<R: Reduction> WindowFilter<R> {
    /// Build a filter for frames of `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if either dimension is
    /// zero.
    pub fn new(
        dimensions: Dimensions,
        timing: Timing,
        reduction: R,
    ) -> Result<Self, PipelineError> {
        let Dimensions { width, height } = dimensions;
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions { width, height });
        }
        let filter = Self {
            reduction,
            dimensions,
            timing,
            history: RowHistory::new(width, KERNEL_SIZE)?,
            window: SlidingWindow::new(KERNEL_SIZE)?,
            x_cnt: 0,
            y_cnt: 0,
        };
        log::debug!(
            "{} filter: {width}x{height}, {timing} timing, latency {} cycles",
            R::NAME,
            filter.latency(),
        );
        Ok(filter)
    }

    /// Advance one cycle.
    ///
    /// The sample goes through the row history, the resulting column
    /// through the window, and the window through the reduction. The
    /// position counters advance on every call, valid or not.
    pub fn process(&mut self, sample_in: Sample) -> Output {
        let column = self.history.advance(sample_in);
        self.window.shift(column.samples);

        let output = match self.timing {
            Timing::Aligned => self.aligned_output(),
            Timing::Reference => self.reference_output(),
        };

        if output.valid && self.position() == self.latency() + 1 {
            log::trace!(
                "{} filter: first valid output at cycle {}",
                R::NAME,
                self.latency()
            );
        }
        output
    }

    /// Valid once the incoming sample has passed (radius, radius): from
    /// then on the window is centred on a frame pixel.
    fn aligned_output(&mut self) -> Output {
        let radius = RADIUS as u64;
        let valid = self.y_cnt > radius
            || (self.y_cnt == radius && u64::from(self.x_cnt) >= radius);

        let taps = if valid {
            self.centred_taps(self.position() - self.latency())
        } else {
            self.raw_taps()
        };
        let sample = self.reduction.reduce(&taps);
        self.count_sample();
        Output { sample, valid }
    }

    /// Raw window, gated on the history after the counters have moved.
    fn reference_output(&mut self) -> Output {
        let sample = self.reduction.reduce(&self.raw_taps());
        self.count_sample();
        let valid = self.history.is_ready() && self.y_cnt > RADIUS as u64;
        Output { sample, valid }
    }

    fn count_sample(&mut self) {
        self.x_cnt += 1;
        if self.x_cnt == self.dimensions.width {
            self.x_cnt = 0;
            self.y_cnt += 1;
        }
    }

    /// Index of the first cycle with a valid output. Under aligned timing
    /// this is also the delay from a pixel's arrival to its output.
    #[must_use]
    pub const fn latency(&self) -> u64 {
        latency_for(self.dimensions, self.timing)
    }

    /// Samples consumed so far.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.y_cnt * self.dimensions.width as u64 + self.x_cnt as u64
    }

    /// Frame dimensions this filter was built for.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Validity and alignment policy.
    #[must_use]
    pub const fn timing(&self) -> Timing {
        self.timing
    }

    /// The reduction applied to each window.
    #[must_use]
    pub const fn reduction(&self) -> &R {
        &self.reduction
    }

    /// The underlying row history.
    #[must_use]
    pub const fn history(&self) -> &RowHistory {
        &self.history
    }

    /// Window contents as stored, with no border handling.
    fn raw_taps(&self) -> Taps {
        let mut taps = [[0; KERNEL_SIZE]; KERNEL_SIZE];
        for (r, row) in taps.iter_mut().enumerate() {
            row.copy_from_slice(self.window.row(r));
        }
        taps
    }

    /// Window contents seen from frame pixel `centre` with clamp-to-edge
    /// borders. Centres past the last frame row (flush cycles) get the raw
    /// window.
    fn centred_taps(&self, centre: u64) -> Taps {
        let width = u64::from(self.dimensions.width);
        let height = u64::from(self.dimensions.height);
        let (cx, cy) = (centre % width, centre / width);
        if cy >= height {
            return self.raw_taps();
        }

        let mut taps = [[0; KERNEL_SIZE]; KERNEL_SIZE];
        for (i, row) in taps.iter_mut().enumerate() {
            let src_row = clamped_index(cy, i, height);
            for (j, tap) in row.iter_mut().enumerate() {
                *tap = self.window.get(src_row, clamped_index(cx, j, width));
            }
        }
        taps
    }
}

/// First valid cycle of a filter for frames of `dimensions`.
///
/// Aligned: `radius` rows plus `radius` samples. Reference: `K - 1` rows
/// less one sample, the call on which the row history turns ready.
#[must_use]
pub const fn latency_for(dimensions: Dimensions, timing: Timing) -> u64 {
    let width = dimensions.width as u64;
    match timing {
        Timing::Aligned => RADIUS as u64 * width + RADIUS as u64,
        Timing::Reference => (KERNEL_SIZE as u64 - 1) * width - 1,
    }
}

/// Window index along one axis holding the nearest in-frame neighbour of
/// `centre` at window index `index`.
///
/// `centre` must lie in `[0, extent)`.
#[allow(clippy::cast_possible_truncation)]
const fn clamped_index(centre: u64, index: usize, extent: u64) -> usize {
    let radius = RADIUS as u64;
    let wanted = (centre + index as u64).saturating_sub(radius);
    let clamped = if wanted > extent - 1 { extent - 1 } else { wanted };
    (clamped + radius - centre) as usize
}
