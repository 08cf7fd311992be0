//! scanline-pipeline: cycle-accurate streaming line-buffer filters (sans-IO).
//!
//! Models a hardware image-filter stage that consumes one grayscale
//! sample per clock cycle in raster order:
//! row history -> sliding window -> 3x3 kernel -> validity flag.
//!
//! Three filters are available (box smoothing, sharpening and Sobel
//! gradient magnitude) plus a bypass and a smoothing-then-gradient chain.
//! Filters run under one of two [`Timing`] policies: aligned outputs with
//! clamp-to-edge borders, or classic line-buffer timing that reduces the
//! raw window. Frame-at-once [`golden`] models compute the same results
//! for both without any streaming state.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and frames. Reading and writing files lives in the
//! `scanline` binary, encoding output frames in `scanline-export`.

pub mod diagnostics;
pub mod filter;
pub mod golden;
pub mod grayscale;
pub mod kernel;
pub mod row_history;
pub mod stage;
pub mod stream;
pub mod types;
pub mod window;

pub use diagnostics::PipelineDiagnostics;
pub use filter::{GradientFilter, SharpeningFilter, SmoothingFilter, WindowFilter};
pub use kernel::{GradientMagnitude, Reduction, Sharpening, Smoothing};
pub use row_history::{Column, RowHistory};
pub use stage::Stage;
pub use stream::{CycleCounters, StreamOutcome};
pub use types::{
    Dimensions, FilterMode, FlushPolicy, GrayImage, GrayscaleArithmetic, Output, PipelineConfig,
    PipelineError, ProcessResult, Sample, SmoothingArithmetic, Timing,
};
pub use window::SlidingWindow;

/// Run the full pipeline on encoded image bytes.
///
/// # Pipeline steps
///
/// 1. Decode the image and convert it to grayscale
/// 2. Stream the frame through a [`Stage`] in `config.mode`, one sample
///    per cycle, followed by the configured flush
/// 3. Reassemble the valid outputs into a frame
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    process_with_diagnostics(image_bytes, config).map(|(result, _)| result)
}

/// Run the full pipeline and collect timing and cycle diagnostics.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_with_diagnostics(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;

    let start = web_time::Instant::now();
    let decoded = grayscale::decode(image_bytes)?;
    let decode = start.elapsed();

    let start = web_time::Instant::now();
    let gray = grayscale::to_grayscale(&decoded, config.grayscale);
    let grayscale = start.elapsed();

    let start = web_time::Instant::now();
    let outcome = stream::stream_frame(&gray, config)?;
    let stream = start.elapsed();

    let dimensions = Dimensions::of(&gray)?;
    let diagnostics = PipelineDiagnostics {
        mode: config.mode,
        timing: config.timing,
        dimensions,
        input_bytes: image_bytes.len(),
        flush: config.flush,
        latency_cycles: outcome.latency,
        cycle_budget: outcome.cycle_budget,
        counters: outcome.counters,
        decode,
        grayscale,
        stream,
    };
    log::info!(
        "processed {}x{} frame in mode {} with {} timing ({} cycles)",
        dimensions.width,
        dimensions.height,
        config.mode,
        config.timing,
        outcome.counters.total_cycles,
    );

    Ok((
        ProcessResult {
            output: outcome.output,
            dimensions,
        },
        diagnostics,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    /// Encode an RGB image as PNG.
    fn png(img: &image::RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    /// Left half black, right half white.
    fn sharp_edge_png(width: u32, height: u32) -> Vec<u8> {
        png(&image::RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        }))
    }

    fn config(mode: FilterMode) -> PipelineConfig {
        PipelineConfig {
            mode,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_invalid_config() {
        let cfg = PipelineConfig {
            flush: FlushPolicy::Rows(0),
            ..PipelineConfig::default()
        };
        let result = process(&sharp_edge_png(4, 4), &cfg);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn bypass_returns_grayscale_frame() {
        let result = process(&sharp_edge_png(8, 4), &config(FilterMode::None)).unwrap();
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 8,
                height: 4
            }
        );
        let white = grayscale::luminance([255; 3], GrayscaleArithmetic::Float);
        for (x, _, p) in result.output.enumerate_pixels() {
            assert_eq!(p.0[0], if x < 4 { 0 } else { white });
        }
    }

    #[test]
    fn gradient_marks_the_edge_columns() {
        let result = process(&sharp_edge_png(10, 6), &config(FilterMode::Gradient)).unwrap();
        for (x, y, p) in result.output.enumerate_pixels() {
            let expected = if x == 4 || x == 5 { 255 } else { 0 };
            assert_eq!(p.0[0], expected, "({x},{y})");
        }
    }

    #[test]
    fn ascii_pixmap_input_is_accepted() {
        let input = b"P3\n3 3\n255\n\
            100 100 100  100 100 100  100 100 100\n\
            100 100 100  100 100 100  100 100 100\n\
            100 100 100  100 100 100  100 100 100\n";
        let cfg = PipelineConfig {
            mode: FilterMode::Smooth,
            grayscale: GrayscaleArithmetic::FixedPoint,
            ..PipelineConfig::default()
        };
        let result = process(input, &cfg).unwrap();
        // (77 + 150 + 29) * 100 >> 8 = 100.
        assert_eq!(result.output.as_raw(), &vec![100; 9]);
    }

    #[test]
    fn process_matches_golden_model() {
        let img = image::RgbImage::from_fn(13, 7, |x, y| {
            image::Rgb([(x * 19) as u8, (y * 31) as u8, ((x + y) * 7) as u8])
        });
        let bytes = png(&img);
        let gray = grayscale::decode_and_grayscale(&bytes, GrayscaleArithmetic::Float).unwrap();
        for timing in [Timing::Aligned, Timing::Reference] {
            for mode in [
                FilterMode::None,
                FilterMode::Smooth,
                FilterMode::Sharpen,
                FilterMode::Gradient,
                FilterMode::SmoothThenGradient,
            ] {
                let cfg = PipelineConfig {
                    timing,
                    ..config(mode)
                };
                let expected = golden::filter_image(&gray, &cfg);
                assert_eq!(
                    process(&bytes, &cfg).unwrap().output,
                    expected,
                    "{timing} mode {mode}"
                );
            }
        }
    }

    #[test]
    fn diagnostics_describe_the_run() {
        let bytes = sharp_edge_png(6, 3);
        let (result, diag) =
            process_with_diagnostics(&bytes, &config(FilterMode::SmoothThenGradient)).unwrap();
        assert_eq!(diag.dimensions, result.dimensions);
        assert_eq!(diag.input_bytes, bytes.len());
        assert_eq!(diag.latency_cycles, 14);
        assert_eq!(diag.cycle_budget, 18 + 14);
        assert_eq!(diag.counters.first_valid_cycle, Some(14));
        assert!(diag.is_complete());
    }

    #[test]
    fn reference_timing_diagnostics() {
        let cfg = PipelineConfig {
            timing: Timing::Reference,
            ..config(FilterMode::Sharpen)
        };
        let (_, diag) = process_with_diagnostics(&sharp_edge_png(6, 3), &cfg).unwrap();
        assert_eq!(diag.timing, Timing::Reference);
        assert_eq!(diag.latency_cycles, 11);
        assert_eq!(diag.cycle_budget, 18 + 11);
        assert_eq!(diag.counters.first_valid_cycle, Some(11));
        assert!(diag.is_complete());
    }

    #[test]
    fn five_row_flush_reports_larger_budget() {
        let cfg = PipelineConfig {
            mode: FilterMode::Smooth,
            flush: FlushPolicy::Rows(5),
            ..PipelineConfig::default()
        };
        let (_, diag) = process_with_diagnostics(&sharp_edge_png(6, 3), &cfg).unwrap();
        assert_eq!(diag.cycle_budget, 18 + 30);
        assert_eq!(diag.counters.total_cycles, 48);
        assert!(diag.is_complete());
    }
}
