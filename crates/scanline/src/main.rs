//! scanline: run an image through the streaming filter pipeline.
//!
//! Reads an image (ASCII or binary PNM, PNG, JPEG, BMP), streams its
//! grayscale frame through the selected mode one sample per cycle, and
//! writes the result as PGM or PNG.
//!
//! # Usage
//!
//! ```text
//! scanline [OPTIONS] <INPUT> <OUTPUT> [MODE]
//! scanline photo.ppm edges.pgm chain
//! scanline photo.png edges.png --mode gradient --png --verify
//! scanline photo.ppm blurred.pgm smooth --timing reference --flush-rows 5
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use scanline_export::{PgmEncoding, PgmMetadata};
use scanline_pipeline::{FilterMode, FlushPolicy, PipelineConfig, PipelineDiagnostics, Timing};

/// Cycle-accurate line-buffer filter pipeline.
///
/// Streams an image through a hardware-style 3x3 filter stage and writes
/// the valid outputs back out as a grayscale image.
#[derive(Parser)]
#[command(name = "scanline", version)]
struct Cli {
    /// Path to the input image.
    input: PathBuf,

    /// Path to write the filtered image to.
    output: PathBuf,

    /// Filter mode (same as `--mode`).
    #[arg(value_enum, conflicts_with = "mode")]
    positional_mode: Option<Mode>,

    /// Filter mode.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// When filters raise their valid flag and which window they reduce.
    #[arg(long, value_enum, default_value_t = TimingArg::Aligned)]
    timing: TimingArg,

    /// Division used by the smoothing filter.
    #[arg(long, value_enum, default_value_t = Smoothing::Division)]
    smoothing: Smoothing,

    /// RGB to luminance conversion.
    #[arg(long, value_enum, default_value_t = Grayscale::Float)]
    grayscale: Grayscale,

    /// Flush for this many whole rows instead of exactly the stage latency.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    flush_rows: Option<u32>,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Write binary PGM (`P5`) instead of ASCII (`P2`).
    #[arg(long, conflicts_with = "png")]
    binary: bool,

    /// Write PNG instead of PGM.
    #[arg(long)]
    png: bool,

    /// Check the streamed output against the frame-at-once model.
    #[arg(long)]
    verify: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Print no diagnostics.
    #[arg(short, long, conflicts_with = "json")]
    quiet: bool,

    /// Increase log verbosity (`-v` info, `-vv` debug, `-vvv` trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Filter mode selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Bypass: output equals input.
    None,
    /// 3x3 box average.
    #[value(alias = "blur")]
    Smooth,
    /// 3x3 sharpening.
    Sharpen,
    /// Sobel gradient magnitude.
    #[value(alias = "sobel")]
    Gradient,
    /// Smoothing followed by gradient magnitude.
    #[value(alias = "both")]
    Chain,
}

/// Filter timing selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TimingArg {
    /// Outputs centred on their pixel, clamp-to-edge borders.
    Aligned,
    /// Classic line-buffer timing on the raw window.
    Reference,
}

/// Smoothing division selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Smoothing {
    /// Truncating integer division by nine.
    Division,
    /// Multiply by a Q16 reciprocal and shift.
    FixedPoint,
}

/// Grayscale conversion selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Grayscale {
    /// `f32` BT.601 weights, truncated.
    Float,
    /// 8-bit fixed-point weights.
    FixedPoint,
}

impl From<Mode> for FilterMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::None => Self::None,
            Mode::Smooth => Self::Smooth,
            Mode::Sharpen => Self::Sharpen,
            Mode::Gradient => Self::Gradient,
            Mode::Chain => Self::SmoothThenGradient,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        mode: cli
            .mode
            .or(cli.positional_mode)
            .map_or(FilterMode::None, FilterMode::from),
        timing: match cli.timing {
            TimingArg::Aligned => Timing::Aligned,
            TimingArg::Reference => Timing::Reference,
        },
        smoothing: match cli.smoothing {
            Smoothing::Division => scanline_pipeline::SmoothingArithmetic::Division,
            Smoothing::FixedPoint => scanline_pipeline::SmoothingArithmetic::FixedPoint,
        },
        grayscale: match cli.grayscale {
            Grayscale::Float => scanline_pipeline::GrayscaleArithmetic::Float,
            Grayscale::FixedPoint => scanline_pipeline::GrayscaleArithmetic::FixedPoint,
        },
        flush: cli.flush_rows.map_or(FlushPolicy::Exact, FlushPolicy::Rows),
    })
}

/// Default log filter for a `-v` count; `RUST_LOG` still wins.
const fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Encode the output frame in the format the flags select.
fn encode_output(
    cli: &Cli,
    frame: &scanline_pipeline::GrayImage,
    config: &PipelineConfig,
) -> Result<Vec<u8>, String> {
    if cli.png {
        return scanline_export::to_png(frame).map_err(|e| format!("Error encoding PNG: {e}"));
    }

    let source = cli.input.file_name().and_then(|s| s.to_str());
    let description = format!("scanline mode={} timing={}", config.mode, config.timing);
    let config_json = serde_json::to_string(config).ok();
    let metadata = PgmMetadata {
        source,
        description: Some(&description),
        config_json: config_json.as_deref(),
    };
    let encoding = if cli.binary {
        PgmEncoding::Binary
    } else {
        PgmEncoding::Ascii
    };
    Ok(scanline_export::to_pgm(frame, encoding, &metadata))
}

/// Print diagnostics to stdout as configured.
fn print_diagnostics(cli: &Cli, diagnostics: &PipelineDiagnostics) -> Result<(), String> {
    if cli.quiet {
        return Ok(());
    }
    if cli.json {
        let json = serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("config: {config:?}");

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let (result, diagnostics) =
        match scanline_pipeline::process_with_diagnostics(&image_bytes, &config) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

    if let Err(msg) = print_diagnostics(&cli, &diagnostics) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    if cli.verify {
        let gray = match scanline_pipeline::grayscale::decode_and_grayscale(
            &image_bytes,
            config.grayscale,
        ) {
            Ok(gray) => gray,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };
        let expected = scanline_pipeline::golden::filter_image(&gray, &config);
        let mismatches = expected
            .as_raw()
            .iter()
            .zip(result.output.as_raw())
            .filter(|(a, b)| a != b)
            .count();
        if mismatches > 0 {
            eprintln!(
                "Verification failed: {mismatches} of {} samples differ from the frame model",
                result.dimensions.pixel_count(),
            );
            return ExitCode::FAILURE;
        }
        log::info!(
            "verified {} samples against the {} model",
            result.dimensions.pixel_count(),
            config.timing,
        );
    }

    let bytes = match encode_output(&cli, &result.output, &config) {
        Ok(bytes) => bytes,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = std::fs::write(&cli.output, &bytes) {
        eprintln!("Error writing {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    eprintln!("Applied mode: {} -> {}", config.mode, cli.output.display());
    ExitCode::SUCCESS
}
