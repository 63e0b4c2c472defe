//! Formatting helpers for log output and the end-of-run merge summary.

use std::time::{Duration, Instant};

use log::info;

use crate::metrics::MergeMetrics;

/// Formats an integer with thousands separators.
///
/// ```
/// use fgmerge_lib::logging::format_count;
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// assert_eq!(format_count(12), "12");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction in `[0, 1]` as a percentage.
///
/// ```
/// use fgmerge_lib::logging::format_percent;
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0)
}

/// Formats a duration as `45s`, `2m 15s` or `1h 30m`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => match (secs / 60, secs % 60) {
            (mins, 0) => format!("{mins}m"),
            (mins, rest) => format!("{mins}m {rest}s"),
        },
        _ => match (secs / 3600, (secs % 3600) / 60) {
            (hours, 0) => format!("{hours}h"),
            (hours, mins) => format!("{hours}h {mins}m"),
        },
    }
}

/// Formats a processing rate, falling back to items per minute below one per second.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        format!("{:.1} items/min", rate * 60.0)
    }
}

/// Logs the counts of a finished merge.
pub fn log_merge_summary(metrics: &MergeMetrics) {
    info!("Merge summary:");
    info!(
        "  Templates: {} ({} aligned, {} missing passed through, {} missing excluded)",
        format_count(metrics.templates),
        format_count(metrics.templates_aligned),
        format_count(metrics.templates_missing_passed_through),
        format_count(metrics.templates_missing_excluded)
    );
    info!(
        "  Reads: {} ({} aligned)",
        format_count(metrics.reads),
        format_percent(metrics.fraction_aligned(), 2)
    );

    let unmapped = [
        ("not placed by the aligner", metrics.reads_unmapped_by_aligner),
        ("no aligned bases after clipping", metrics.reads_unmapped_no_aligned_bases),
        ("alignment past the reference end", metrics.reads_unmapped_beyond_reference),
    ];
    for (reason, count) in unmapped.into_iter().filter(|(_, count)| *count > 0) {
        info!("  Unmapped, {reason}: {}", format_count(count));
    }

    if metrics.reads_contaminant > 0 {
        info!(
            "  Contaminant reads: {} ({} unmapped)",
            format_count(metrics.reads_contaminant),
            format_count(metrics.reads_contaminant_unmapped)
        );
    }
    if metrics.pairs_overlap_clipped > 0 {
        info!(
            "  Overlapping pairs clipped: {} ({} bases)",
            format_count(metrics.pairs_overlap_clipped),
            format_count(metrics.bases_overlap_clipped)
        );
    }
    if metrics.secondary_or_supplementary_skipped > 0 {
        info!(
            "  Secondary/supplementary alignments skipped: {}",
            format_count(metrics.secondary_or_supplementary_skipped)
        );
    }
}

/// Times an operation and logs its throughput on completion.
///
/// ```no_run
/// use fgmerge_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Merging alignments");
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Starts the timer and logs the operation name.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the item count, elapsed time and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
