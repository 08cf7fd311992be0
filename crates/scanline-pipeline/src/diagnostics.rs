//! Run diagnostics: wall-clock timing and cycle statistics.
//!
//! Every call to [`process_with_diagnostics`](crate::process_with_diagnostics)
//! fills a [`PipelineDiagnostics`] alongside the filtered frame. Timestamps
//! come from `web-time`; durations are stored as [`std::time::Duration`]
//! and serialized as fractional seconds, since `Duration` has no serde
//! impls of its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stream::CycleCounters;
use crate::types::{Dimensions, FilterMode, FlushPolicy, Timing};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("duration must be finite and non-negative"))
    }
}

/// Diagnostics collected from one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Mode the stage ran in.
    pub mode: FilterMode,
    /// Filter timing policy.
    pub timing: Timing,
    /// Frame dimensions.
    pub dimensions: Dimensions,
    /// Size of the encoded input.
    pub input_bytes: usize,
    /// Flush policy used to size the cycle budget.
    pub flush: FlushPolicy,
    /// Stage latency in cycles.
    pub latency_cycles: u64,
    /// Cycles the driver was allowed to run.
    pub cycle_budget: u64,
    /// Cycle statistics from the driver.
    pub counters: CycleCounters,
    /// Image decoding.
    #[serde(with = "duration_serde")]
    pub decode: Duration,
    /// RGB to grayscale conversion.
    #[serde(with = "duration_serde")]
    pub grayscale: Duration,
    /// Streaming the frame through the stage.
    #[serde(with = "duration_serde")]
    pub stream: Duration,
}

impl PipelineDiagnostics {
    /// Whether the driver collected a full frame.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.counters.is_complete(self.dimensions)
    }

    /// Sum of the stage durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.decode + self.grayscale + self.stream
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels, {} bytes in)",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
            self.input_bytes,
        ));
        lines.push(format!(
            "Mode: {}  |  Timing: {}  |  Flush: {:?}",
            self.mode, self.timing, self.flush
        ));
        lines.push(String::new());

        lines.push(format!("{:<16} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(40));
        let total_ms = duration_ms(self.total_duration());
        for (name, duration) in [
            ("Decode", self.decode),
            ("Grayscale", self.grayscale),
            ("Stream", self.stream),
        ] {
            let ms = duration_ms(duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%"));
        }
        lines.push(format!("{:<16} {total_ms:>8.3}ms", "Total"));
        lines.push(String::new());

        let first_valid = self
            .counters
            .first_valid_cycle
            .map_or_else(|| "never".to_string(), |c| c.to_string());
        lines.push(format!(
            "Cycles: {} of {} budget  |  Latency: {}  |  First valid: {first_valid}",
            self.counters.total_cycles, self.cycle_budget, self.latency_cycles,
        ));
        lines.push(format!(
            "Valid cycles: {}  |  Collected: {} of {}{}",
            self.counters.valid_cycles,
            self.counters.collected,
            self.dimensions.pixel_count(),
            if self.is_complete() { "" } else { " (INCOMPLETE)" },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            mode: FilterMode::SmoothThenGradient,
            timing: Timing::Aligned,
            dimensions: Dimensions {
                width: 6,
                height: 3,
            },
            input_bytes: 120,
            flush: FlushPolicy::Exact,
            latency_cycles: 14,
            cycle_budget: 32,
            counters: CycleCounters {
                total_cycles: 32,
                valid_cycles: 18,
                first_valid_cycle: Some(14),
                collected: 18,
            },
            decode: Duration::from_millis(3),
            grayscale: Duration::from_millis(1),
            stream: Duration::from_millis(4),
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn total_duration_sums_stages() {
        assert_eq!(sample().total_duration(), Duration::from_millis(8));
    }

    #[test]
    fn report_lists_stages_and_cycles() {
        let report = sample().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Mode: chain  |  Timing: aligned"));
        assert!(report.contains("Grayscale"));
        assert!(report.contains("First valid: 14"));
        assert!(!report.contains("INCOMPLETE"));
    }

    #[test]
    fn report_flags_incomplete_collection() {
        let mut diag = sample();
        diag.counters.collected = 10;
        diag.counters.first_valid_cycle = None;
        assert!(!diag.is_complete());
        let report = diag.report();
        assert!(report.contains("INCOMPLETE"));
        assert!(report.contains("First valid: never"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["decode"].as_f64().unwrap() - 0.003).abs() < 1e-9);
        assert_eq!(json["mode"], "chain");
        assert_eq!(json["timing"], "aligned");
        assert_eq!(json["counters"]["first_valid_cycle"], 14);
    }

    #[test]
    fn diagnostics_json_round_trip() {
        let diag = sample();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.counters, diag.counters);
        assert_eq!(back.mode, diag.mode);
        assert_eq!(back.dimensions, diag.dimensions);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["stream"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(json).is_err());
    }
}
