//! Mode-selected pipeline stage.
//!
//! A [`Stage`] owns one instance of every filter and routes each sample
//! through the ones its [`FilterMode`] needs. Filters that the mode does
//! not use are never called, so their position counters stay at zero
//! instead of drifting away from the stream.
//!
//! In chain mode the smoothing output feeds the gradient filter, but only
//! on cycles where smoothing is valid. The gradient filter therefore runs
//! on the smoothed stream's clock and the two latencies add up. This
//! holds under both [`Timing`] policies.

use crate::filter::{GradientFilter, SharpeningFilter, SmoothingFilter, latency_for};
use crate::kernel::{GradientMagnitude, Sharpening, Smoothing};
use crate::types::{Dimensions, FilterMode, Output, PipelineConfig, PipelineError, Sample, Timing};

/// A complete processing stage: all filters plus the active mode.
#[derive(Debug, Clone)]
pub struct Stage {
    mode: FilterMode,
    timing: Timing,
    dimensions: Dimensions,
    smoothing: SmoothingFilter,
    sharpening: SharpeningFilter,
    gradient: GradientFilter,
}

impl Stage {
    /// Build a stage for frames of `dimensions`, running `config.mode`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if either dimension is
    /// zero.
    pub fn new(dimensions: Dimensions, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let timing = config.timing;
        let stage = Self {
            mode: config.mode,
            timing,
            dimensions,
            smoothing: SmoothingFilter::new(
                dimensions,
                timing,
                Smoothing {
                    arithmetic: config.smoothing,
                },
            )?,
            sharpening: SharpeningFilter::new(dimensions, timing, Sharpening)?,
            gradient: GradientFilter::new(dimensions, timing, GradientMagnitude)?,
        };
        log::debug!(
            "stage: mode {}, {timing} timing, {}x{}, latency {} cycles",
            stage.mode,
            dimensions.width,
            dimensions.height,
            stage.latency(),
        );
        Ok(stage)
    }

    /// Advance one cycle.
    pub fn process(&mut self, sample_in: Sample) -> Output {
        match self.mode {
            FilterMode::None => Output::valid(sample_in),
            FilterMode::Smooth => self.smoothing.process(sample_in),
            FilterMode::Sharpen => self.sharpening.process(sample_in),
            FilterMode::Gradient => self.gradient.process(sample_in),
            FilterMode::SmoothThenGradient => {
                let smoothed = self.smoothing.process(sample_in);
                if smoothed.valid {
                    self.gradient.process(smoothed.sample)
                } else {
                    Output::invalid(smoothed.sample)
                }
            }
        }
    }

    /// Index of the first cycle with a valid output, and the exact flush
    /// length that yields `W * H` valid outputs.
    #[must_use]
    pub const fn latency(&self) -> u64 {
        let single = latency_for(self.dimensions, self.timing);
        match self.mode {
            FilterMode::None => 0,
            FilterMode::Smooth | FilterMode::Sharpen | FilterMode::Gradient => single,
            FilterMode::SmoothThenGradient => 2 * single,
        }
    }

    /// The active mode.
    #[must_use]
    pub const fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Filter timing shared by every filter in the stage.
    #[must_use]
    pub const fn timing(&self) -> Timing {
        self.timing
    }

    /// Frame dimensions this stage was built for.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The smoothing filter.
    #[must_use]
    pub const fn smoothing(&self) -> &SmoothingFilter {
        &self.smoothing
    }

    /// The sharpening filter.
    #[must_use]
    pub const fn sharpening(&self) -> &SharpeningFilter {
        &self.sharpening
    }

    /// The gradient filter.
    #[must_use]
    pub const fn gradient(&self) -> &GradientFilter {
        &self.gradient
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    fn stage(width: u32, height: u32, mode: FilterMode) -> Stage {
        timed_stage(width, height, mode, Timing::Aligned)
    }

    fn timed_stage(width: u32, height: u32, mode: FilterMode, timing: Timing) -> Stage {
        let config = PipelineConfig {
            mode,
            timing,
            ..PipelineConfig::default()
        };
        Stage::new(Dimensions::new(width, height).unwrap(), &config).unwrap()
    }

    /// Stream `frame` then zeros for the stage latency, keeping the first
    /// `W*H` valid outputs.
    fn run(stage: &mut Stage, frame: &[Sample]) -> Vec<Sample> {
        let flush = stage.latency() as usize;
        frame
            .iter()
            .copied()
            .chain(std::iter::repeat_n(0, flush))
            .filter_map(|s| stage.process(s).valid_sample())
            .take(frame.len())
            .collect()
    }

    fn first_valid_cycle(stage: &mut Stage, sample: Sample) -> u64 {
        (0..10_000u64).find(|_| stage.process(sample).valid).unwrap()
    }

    #[test]
    fn bypass_is_always_valid_identity() {
        let mut s = stage(3, 3, FilterMode::None);
        for v in [0, 17, 255] {
            assert_eq!(s.process(v), Output::valid(v));
        }
        assert_eq!(s.latency(), 0);
    }

    #[test]
    fn bypass_touches_no_filter_state() {
        let mut s = stage(4, 4, FilterMode::None);
        for _ in 0..50 {
            s.process(9);
        }
        assert_eq!(s.smoothing().position(), 0);
        assert_eq!(s.sharpening().position(), 0);
        assert_eq!(s.gradient().position(), 0);
    }

    #[test]
    fn single_filter_modes_only_advance_their_filter() {
        let mut s = stage(4, 4, FilterMode::Sharpen);
        for _ in 0..30 {
            s.process(9);
        }
        assert_eq!(s.sharpening().position(), 30);
        assert_eq!(s.smoothing().position(), 0);
        assert_eq!(s.gradient().position(), 0);
    }

    #[test]
    fn three_by_three_of_hundreds() {
        let frame = [100; 9];
        assert_eq!(run(&mut stage(3, 3, FilterMode::Smooth), &frame), [100; 9]);
        assert_eq!(run(&mut stage(3, 3, FilterMode::Gradient), &frame), [0; 9]);
        assert_eq!(run(&mut stage(3, 3, FilterMode::Sharpen), &frame), [100; 9]);
        assert_eq!(run(&mut stage(3, 3, FilterMode::None), &frame), [100; 9]);
    }

    #[test]
    fn bright_centre_pixel_gradient() {
        // Both Sobel kernels have a zero centre weight, so the output
        // centred on the bright pixel is 0; every neighbour sees it at
        // weight 1 or 2 in at least one kernel and saturates.
        let mut frame = [0; 9];
        frame[4] = 255;
        let out = run(&mut stage(3, 3, FilterMode::Gradient), &frame);
        assert_eq!(out, [255, 255, 255, 255, 0, 255, 255, 255, 255]);
    }

    #[test]
    fn single_filter_latency_is_row_plus_one() {
        for mode in [FilterMode::Smooth, FilterMode::Sharpen, FilterMode::Gradient] {
            let mut s = stage(6, 4, mode);
            assert_eq!(s.latency(), 7);
            assert_eq!(first_valid_cycle(&mut s, 1), 7, "mode {mode}");
        }
    }

    #[test]
    fn chain_latency_is_sum_of_filter_latencies() {
        for (w, h) in [(1, 1), (3, 3), (6, 4), (17, 9)] {
            let smooth = first_valid_cycle(&mut stage(w, h, FilterMode::Smooth), 1);
            let gradient = first_valid_cycle(&mut stage(w, h, FilterMode::Gradient), 1);
            let mut chain = stage(w, h, FilterMode::SmoothThenGradient);
            assert_eq!(chain.latency(), smooth + gradient);
            assert_eq!(first_valid_cycle(&mut chain, 1), smooth + gradient, "{w}x{h}");
        }
    }

    #[test]
    fn chain_gradient_only_advances_on_valid_smoothing() {
        let mut s = stage(5, 5, FilterMode::SmoothThenGradient);
        for _ in 0..20 {
            s.process(4);
        }
        let smooth_latency = latency_for(s.dimensions(), Timing::Aligned);
        assert_eq!(s.smoothing().position(), 20);
        assert_eq!(s.gradient().position(), 20 - smooth_latency);
        assert_eq!(s.sharpening().position(), 0);
    }

    #[test]
    fn chain_of_uniform_frame_is_zero() {
        let frame = vec![180; 7 * 5];
        assert_eq!(
            run(&mut stage(7, 5, FilterMode::SmoothThenGradient), &frame),
            vec![0; 35]
        );
    }

    #[test]
    fn every_mode_yields_exactly_w_times_h_outputs() {
        let modes = [
            FilterMode::None,
            FilterMode::Smooth,
            FilterMode::Sharpen,
            FilterMode::Gradient,
            FilterMode::SmoothThenGradient,
        ];
        for mode in modes {
            for (w, h) in [(1, 1), (1, 5), (5, 1), (2, 2), (3, 3), (8, 3)] {
                let frame: Vec<Sample> = (0..w * h).map(|i| (i * 37 % 256) as Sample).collect();
                let mut s = stage(w, h, mode);
                let budget = frame.len() as u64 + s.latency();
                let valid = frame
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(0))
                    .take(budget as usize)
                    .filter(|&v| s.process(v).valid)
                    .count();
                assert!(
                    valid >= frame.len(),
                    "mode {mode} {w}x{h}: only {valid} valid outputs",
                );
                assert_eq!(run(&mut stage(w, h, mode), &frame).len(), frame.len());
            }
        }
    }

    #[test]
    fn reference_chain_latency_is_twice_two_rows_less_one() {
        for (w, h) in [(1, 1), (3, 3), (4, 4), (6, 4), (17, 9)] {
            let mut chain = timed_stage(w, h, FilterMode::SmoothThenGradient, Timing::Reference);
            let expected = 2 * (2 * u64::from(w) - 1);
            assert_eq!(chain.latency(), expected);
            assert_eq!(first_valid_cycle(&mut chain, 1), expected, "{w}x{h}");
        }
    }

    #[test]
    fn reference_modes_yield_exactly_w_times_h_outputs_with_exact_flush() {
        for mode in [
            FilterMode::None,
            FilterMode::Smooth,
            FilterMode::Sharpen,
            FilterMode::Gradient,
            FilterMode::SmoothThenGradient,
        ] {
            for (w, h) in [(1, 1), (2, 2), (3, 3), (8, 3)] {
                let frame: Vec<Sample> = (0..w * h).map(|i| (i * 37 % 256) as Sample).collect();
                let mut s = timed_stage(w, h, mode, Timing::Reference);
                let budget = frame.len() as u64 + s.latency();
                let valid = frame
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(0))
                    .take(budget as usize)
                    .filter(|&v| s.process(v).valid)
                    .count();
                assert_eq!(valid, frame.len(), "mode {mode} {w}x{h}");
            }
        }
    }

    #[test]
    fn reference_smoothing_of_three_by_three_hundreds() {
        let mut s = timed_stage(3, 3, FilterMode::Smooth, Timing::Reference);
        assert_eq!(run(&mut s, &[100; 9]), [66, 77, 88, 100, 88, 77, 66, 55, 44]);
        assert_eq!(s.timing(), Timing::Reference);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let dims = Dimensions {
            width: 0,
            height: 3,
        };
        assert!(matches!(
            Stage::new(dims, &PipelineConfig::default()),
            Err(PipelineError::InvalidDimensions { .. })
        ));
    }
}
