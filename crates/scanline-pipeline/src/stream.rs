//! Cycle loop: drive a whole frame through a [`Stage`].
//!
//! The driver feeds one sample per cycle in row-major order, then keeps
//! feeding zero samples until the cycle budget runs out so the buffered
//! latency drains. Only valid outputs are kept, in the order they arrive,
//! up to one frame's worth.
//!
//! A budget shorter than `W*H + latency` is not an error: the tail of the
//! output frame simply stays zero and the counters show how much was
//! collected.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::{Dimensions, GrayImage, PipelineConfig, PipelineError, Sample};

/// Cycle statistics from one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleCounters {
    /// Cycles executed (frame samples plus flush).
    pub total_cycles: u64,
    /// Cycles on which the stage reported a valid output.
    pub valid_cycles: u64,
    /// Index of the first valid cycle, if any.
    pub first_valid_cycle: Option<u64>,
    /// Valid outputs written to the output frame.
    pub collected: u64,
}

impl CycleCounters {
    /// Whether a full frame was collected.
    #[must_use]
    pub const fn is_complete(&self, dimensions: Dimensions) -> bool {
        self.collected == dimensions.pixel_count()
    }
}

/// Output frame and counters from one driver run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Valid outputs reassembled into a frame, row-major in arrival order.
    pub output: GrayImage,
    /// Cycle statistics.
    pub counters: CycleCounters,
    /// Stage latency in cycles.
    pub latency: u64,
    /// Cycles the driver was allowed to run.
    pub cycle_budget: u64,
}

/// Run `frame` through `stage` for `cycle_budget` cycles.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] carrying the frame's size
/// if it differs from the dimensions `stage` was built for.
pub fn run_frame(
    frame: &GrayImage,
    stage: &mut Stage,
    cycle_budget: u64,
) -> Result<StreamOutcome, PipelineError> {
    let dimensions = stage.dimensions();
    if (frame.width(), frame.height()) != (dimensions.width, dimensions.height) {
        return Err(PipelineError::InvalidDimensions {
            width: frame.width(),
            height: frame.height(),
        });
    }

    let source = frame.as_raw();
    let mut output = vec![0; source.len()];
    let mut counters = CycleCounters::default();

    let samples = source.iter().copied().chain(std::iter::repeat::<Sample>(0));
    for (cycle, sample_in) in (0..cycle_budget).zip(samples) {
        let out = stage.process(sample_in);
        counters.total_cycles += 1;
        if !out.valid {
            continue;
        }
        counters.valid_cycles += 1;
        if counters.first_valid_cycle.is_none() {
            log::trace!("driver: first valid output at cycle {cycle}");
            counters.first_valid_cycle = Some(cycle);
        }
        if let Some(slot) = usize::try_from(counters.collected)
            .ok()
            .and_then(|i| output.get_mut(i))
        {
            *slot = out.sample;
            counters.collected += 1;
        }
    }

    if !counters.is_complete(dimensions) {
        log::warn!(
            "driver: collected {} of {} samples in {} cycles; flush too short for latency {}",
            counters.collected,
            dimensions.pixel_count(),
            counters.total_cycles,
            stage.latency(),
        );
    }

    let output = GrayImage::from_raw(dimensions.width, dimensions.height, output).ok_or(
        PipelineError::InvalidDimensions {
            width: dimensions.width,
            height: dimensions.height,
        },
    )?;
    Ok(StreamOutcome {
        output,
        counters,
        latency: stage.latency(),
        cycle_budget,
    })
}

/// Build a stage for `frame` and stream it with the configured flush.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] for an empty frame and
/// [`PipelineError::InvalidConfig`] for an invalid configuration.
pub fn stream_frame(
    frame: &GrayImage,
    config: &PipelineConfig,
) -> Result<StreamOutcome, PipelineError> {
    config.validate()?;
    let dimensions = Dimensions::of(frame)?;
    let mut stage = Stage::new(dimensions, config)?;
    let budget = config.flush.cycle_budget(dimensions, stage.latency());
    log::debug!(
        "driver: {} cycles for {}x{} frame ({:?} flush, {} timing)",
        budget,
        dimensions.width,
        dimensions.height,
        config.flush,
        config.timing,
    );
    run_frame(frame, &mut stage, budget)
}

/// Stream `frame` and return only the output frame.
///
/// # Errors
///
/// Same as [`stream_frame`].
pub fn filter_frame(frame: &GrayImage, config: &PipelineConfig) -> Result<GrayImage, PipelineError> {
    stream_frame(frame, config).map(|outcome| outcome.output)
}
