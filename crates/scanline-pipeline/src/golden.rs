//! Frame-at-once golden models.
//!
//! Each model computes what the streaming [`Stage`](crate::Stage) should
//! produce for a whole [`GrayImage`], with no row history, no window and
//! no notion of cycles, so agreement between the two is a strong check on
//! the streaming timing.
//!
//! The aligned model is built on [`imageproc::filter::filter_clamped`],
//! whose borders pad by continuity (clamp-to-edge). The line-buffer model
//! reads the flattened sample stream directly, since its windows wrap
//! across rows and see zeros before the frame and after it.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel::{self, Kernel};

use crate::types::{FilterMode, PipelineConfig, Sample, Timing};

const BOX: [i32; 9] = [1; 9];
const LAPLACIAN_SHARPEN: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];
const SOBEL_X: [i32; 9] = [-1, 0, 1, -2, 0, 2, -1, 0, 1];
const SOBEL_Y: [i32; 9] = [-1, -2, -1, 0, 0, 0, 1, 2, 1];

/// Expected output of a stage built from `config` for `image`.
///
/// Smoothing arithmetic is not consulted: both variants are exact
/// divisions by nine.
#[must_use = "returns the filtered image"]
pub fn filter_image(image: &GrayImage, config: &PipelineConfig) -> GrayImage {
    match config.timing {
        Timing::Aligned => aligned_image(image, config.mode),
        Timing::Reference => line_buffer_image(image, config.mode),
    }
}

/// Clamp-to-edge 3x3 filtering, one output per input pixel.
#[must_use = "returns the filtered image"]
pub fn aligned_image(image: &GrayImage, mode: FilterMode) -> GrayImage {
    match mode {
        FilterMode::None => image.clone(),
        FilterMode::Smooth => box_mean(image),
        FilterMode::Sharpen => sharpen(image),
        FilterMode::Gradient => sobel_l1(image),
        FilterMode::SmoothThenGradient => sobel_l1(&box_mean(image)),
    }
}

fn box_mean(image: &GrayImage) -> GrayImage {
    let sums: Image<Luma<i16>> = filter_clamped(image, Kernel::new(&BOX, 3, 3));
    map_sums(&sums, |sum| sum / 9)
}

fn sharpen(image: &GrayImage) -> GrayImage {
    let sums: Image<Luma<i16>> = filter_clamped(image, Kernel::new(&LAPLACIAN_SHARPEN, 3, 3));
    map_sums(&sums, |sum| sum)
}

fn sobel_l1(image: &GrayImage) -> GrayImage {
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let h = i32::from(gx.get_pixel(x, y).0[0]);
        let v = i32::from(gy.get_pixel(x, y).0[0]);
        Luma([to_sample(h.abs() + v.abs())])
    })
}

fn map_sums(sums: &Image<Luma<i16>>, f: impl Fn(i32) -> i32) -> GrayImage {
    GrayImage::from_fn(sums.width(), sums.height(), |x, y| {
        Luma([to_sample(f(i32::from(sums.get_pixel(x, y).0[0])))])
    })
}

fn to_sample(value: i32) -> Sample {
    Sample::try_from(value.clamp(0, i32::from(Sample::MAX))).unwrap_or(Sample::MAX)
}

/// Line-buffer filtering: output `k` is the raw window of stream sample
/// `k + 2W - 1` and its eight stream predecessors at offsets of one sample
/// and one row, with zeros before the first sample and after the last.
///
/// In chain mode the second filter reads the first filter's output
/// stream, which keeps running past the frame while the driver flushes.
#[must_use = "returns the filtered image"]
pub fn line_buffer_image(image: &GrayImage, mode: FilterMode) -> GrayImage {
    let width = image.width() as usize;
    let count = image.as_raw().len();
    let samples = match mode {
        FilterMode::None => image.as_raw().clone(),
        FilterMode::Smooth => line_buffer_stream(image.as_raw(), width, count, &BOX, |s| s / 9),
        FilterMode::Sharpen => {
            line_buffer_stream(image.as_raw(), width, count, &LAPLACIAN_SHARPEN, |s| s)
        }
        FilterMode::Gradient => line_buffer_gradient(image.as_raw(), width, count),
        FilterMode::SmoothThenGradient => {
            let latency = 2 * width - 1;
            let smoothed =
                line_buffer_stream(image.as_raw(), width, count + latency, &BOX, |s| s / 9);
            line_buffer_gradient(&smoothed, width, count)
        }
    };
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let index = y as usize * width + x as usize;
        Luma([samples.get(index).copied().unwrap_or_default()])
    })
}

fn line_buffer_stream(
    stream: &[Sample],
    width: usize,
    count: usize,
    weights: &[i32; 9],
    f: impl Fn(i32) -> i32,
) -> Vec<Sample> {
    (0..count)
        .map(|k| to_sample(f(stream_window_sum(stream, width, k, weights))))
        .collect()
}

fn line_buffer_gradient(stream: &[Sample], width: usize, count: usize) -> Vec<Sample> {
    (0..count)
        .map(|k| {
            let h = stream_window_sum(stream, width, k, &SOBEL_X);
            let v = stream_window_sum(stream, width, k, &SOBEL_Y);
            to_sample(h.abs() + v.abs())
        })
        .collect()
}

/// Weighted sum over the window completed by stream sample
/// `k + 2 * width - 1`. Tap `(i, j)` reads the sample `(2 - i)` rows and
/// `(2 - j)` samples earlier.
fn stream_window_sum(stream: &[Sample], width: usize, k: usize, weights: &[i32; 9]) -> i32 {
    let newest = k + 2 * width - 1;
    let mut sum = 0;
    for i in 0..3 {
        for j in 0..3 {
            let back = (2 - i) * width + (2 - j);
            let sample = newest
                .checked_sub(back)
                .and_then(|n| stream.get(n))
                .copied()
                .unwrap_or(0);
            sum += weights[i * 3 + j] * i32::from(sample);
        }
    }
    sum
}
