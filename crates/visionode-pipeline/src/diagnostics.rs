//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! Collected by [`Pipeline::process_with_diagnostics`](crate::Pipeline::process_with_diagnostics)
//! for tuning thresholds, ROI, and downsample factors on a host before
//! flashing a device. Plain [`Pipeline::process`](crate::Pipeline::process)
//! skips all of this.
//!
//! The crate does no timekeeping of its own. Callers pass a [`Clock`],
//! so the same code works with `std::time::Instant` on a host, a
//! hardware tick counter on a device, or [`NullClock`] in tests.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blob::BlobLabelerKind;

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock where no time ever passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single frame.
///
/// Grayscale conversion always runs. The other stages are optional and
/// are `None` when disabled in the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: RGB565 to luminance.
    pub grayscale: StageDiagnostics,
    /// Stage 2: ROI crop (only when `enable_roi`).
    pub roi: Option<StageDiagnostics>,
    /// Stage 3: downsample (only when `downsample_factor > 1`).
    pub downsample: Option<StageDiagnostics>,
    /// Stage 4: threshold (only when `enable_threshold`).
    pub threshold: Option<StageDiagnostics>,
    /// Stage 5: blob detection (only when `enable_blob_detection`).
    pub blob_detection: Option<StageDiagnostics>,
    /// Wall-clock duration of the whole frame (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the frame.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luminance conversion.
    Grayscale {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
    },
    /// ROI crop.
    Roi {
        /// Clamped left edge.
        x: u32,
        /// Clamped top edge.
        y: u32,
        /// Image width after the crop.
        width: u32,
        /// Image height after the crop.
        height: u32,
        /// `false` when the rectangle clamped to nothing and the crop
        /// was skipped.
        applied: bool,
    },
    /// Downsample.
    Downsample {
        /// Factor applied on each axis.
        factor: u32,
        /// Image width after downsampling.
        width: u32,
        /// Image height after downsampling.
        height: u32,
    },
    /// Threshold.
    Threshold {
        /// Cutoff value.
        threshold: u8,
        /// Whether the comparison was inverted.
        invert: bool,
        /// Pixels set to 255.
        foreground_pixels: u64,
    },
    /// Blob detection.
    BlobDetection {
        /// Which labeler ran.
        labeler: BlobLabelerKind,
        /// Connected components found.
        components: usize,
        /// Components reported as blobs.
        blobs: usize,
        /// Components below the minimum area.
        discarded: usize,
        /// Area of the largest component.
        largest_area: u32,
    },
}

/// High-level summary for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Input frame width.
    pub input_width: u32,
    /// Input frame height.
    pub input_height: u32,
    /// Output image width.
    pub output_width: u32,
    /// Output image height.
    pub output_height: u32,
    /// Blobs reported.
    pub blob_count: usize,
}

impl PipelineDiagnostics {
    /// Stages that ran, in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![("Grayscale", &self.grayscale)];
        if let Some(ref s) = self.roi {
            stages.push(("ROI", s));
        }
        if let Some(ref s) = self.downsample {
            stages.push(("Downsample", s));
        }
        if let Some(ref s) = self.threshold {
            stages.push(("Threshold", s));
        }
        if let Some(ref s) = self.blob_detection {
            stages.push(("Blob Detection", s));
        }
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} -> {}x{}",
            self.summary.input_width,
            self.summary.input_height,
            self.summary.output_width,
            self.summary.output_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Blobs: {}", self.summary.blob_count));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Roi {
            x,
            y,
            width,
            height,
            applied,
        } => {
            if *applied {
                format!("({x},{y}) {width}x{height}")
            } else {
                format!("degenerate, kept {width}x{height}")
            }
        }
        StageMetrics::Downsample {
            factor,
            width,
            height,
        } => format!("/{factor} -> {width}x{height}"),
        StageMetrics::Threshold {
            threshold,
            invert,
            foreground_pixels,
        } => {
            let op = if *invert { "<" } else { ">=" };
            format!("{op}{threshold} fg={foreground_pixels}")
        }
        StageMetrics::BlobDetection {
            labeler,
            components,
            blobs,
            discarded,
            largest_area,
        } => format!(
            "{labeler} {components} components, {blobs} blobs ({discarded} too small, largest={largest_area})",
        ),
    }
}

/// Frames-per-second meter.
///
/// Call [`tick`](Self::tick) once per frame; it reports the
/// instantaneous rate from the interval since the previous tick.
pub struct FrameTimer<C: Clock> {
    clock: C,
    last: Option<C::Instant>,
}

impl<C: Clock> FrameTimer<C> {
    /// Create a timer. The first tick only records a timestamp.
    pub const fn new(clock: C) -> Self {
        Self { clock, last: None }
    }

    /// Mark the start of a frame.
    ///
    /// Returns `None` on the first call and when no measurable time has
    /// passed since the previous call.
    pub fn tick(&mut self) -> Option<f64> {
        let now = self.clock.now();
        let fps = self.last.as_ref().and_then(|last| {
            let secs = self.clock.elapsed(last).as_secs_f64();
            (secs > 0.0).then(|| 1.0 / secs)
        });
        self.last = Some(now);
        fps
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock driven by the test: `now` is whatever was last set.
    struct ManualClock {
        now: Cell<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Cell::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for &ManualClock {
        type Instant = Duration;

        fn now(&self) -> Duration {
            self.now.get()
        }

        fn elapsed(&self, since: &Duration) -> Duration {
            self.now.get() - *since
        }
    }

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            grayscale: StageDiagnostics {
                duration: Duration::from_millis(4),
                metrics: StageMetrics::Grayscale {
                    width: 320,
                    height: 240,
                },
            },
            roi: Some(StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Roi {
                    x: 80,
                    y: 60,
                    width: 160,
                    height: 120,
                    applied: true,
                },
            }),
            downsample: None,
            threshold: Some(StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Threshold {
                    threshold: 100,
                    invert: false,
                    foreground_pixels: 400,
                },
            }),
            blob_detection: Some(StageDiagnostics {
                duration: Duration::from_millis(2),
                metrics: StageMetrics::BlobDetection {
                    labeler: BlobLabelerKind::FloodFill,
                    components: 1,
                    blobs: 1,
                    discarded: 0,
                    largest_area: 400,
                },
            }),
            total_duration: Duration::from_millis(8),
            summary: PipelineSummary {
                input_width: 320,
                input_height: 240,
                output_width: 160,
                output_height: 120,
                blob_count: 1,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn null_clock_never_advances() {
        let clock = NullClock;
        clock.now();
        assert_eq!(clock.elapsed(&()), Duration::ZERO);
    }

    #[test]
    fn stages_skip_disabled() {
        let names: Vec<_> = sample().stages().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Grayscale", "ROI", "Threshold", "Blob Detection"]);
    }

    #[test]
    fn report_lists_stages_that_ran() {
        let report = sample().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("320x240 -> 160x120"));
        assert!(report.contains("Blob Detection"));
        assert!(report.contains("FloodFill"));
        assert!(!report.contains("Downsample"));
    }

    #[test]
    fn report_with_zero_total_does_not_divide_by_zero() {
        let mut diag = sample();
        diag.total_duration = Duration::ZERO;
        assert!(diag.report().contains("0.0%"));
    }

    #[test]
    fn json_durations_are_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        let secs = json["total_duration"].as_f64().unwrap();
        assert!((secs - 0.008).abs() < 1e-9);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.summary, sample().summary);
        assert_eq!(back.stages().len(), 4);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(json).is_err());
    }

    #[test]
    fn frame_timer_reports_instantaneous_rate() {
        let clock = ManualClock::new();
        let mut timer = FrameTimer::new(&clock);
        assert_eq!(timer.tick(), None);

        clock.advance(Duration::from_millis(100));
        let fps = timer.tick().unwrap();
        assert!((fps - 10.0).abs() < 1e-9, "fps = {fps}");

        clock.advance(Duration::from_millis(40));
        let fps = timer.tick().unwrap();
        assert!((fps - 25.0).abs() < 1e-9, "fps = {fps}");
    }

    #[test]
    fn frame_timer_with_null_clock_never_reports() {
        let mut timer = FrameTimer::new(NullClock);
        for _ in 0..100 {
            assert_eq!(timer.tick(), None);
        }
    }
}
