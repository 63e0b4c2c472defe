//! Metrics collected while merging alignments.
//!
//! [`MergeMetrics`] counts templates, reads and the outcome of every alignment transfer. It is
//! written as a single-row TSV through `fgoxide`.

use anyhow::{Context, Result};
use fgmerge_sam::{TransferOutcome, UnmappingStrategy};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float with the standard metric precision.
///
/// ```
/// use fgmerge_lib::metrics::format_float;
/// assert_eq!(format_float(0.25), "0.250000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// A metric type that can be written to and read from TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name used in error messages.
    fn metric_name() -> &'static str;
}

/// Counts describing one run of the merger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMetrics {
    /// Templates read from the unmapped input
    pub templates: u64,
    /// Templates with a matching aligned template
    pub templates_aligned: u64,
    /// Templates with no aligned counterpart that were written unchanged
    pub templates_missing_passed_through: u64,
    /// Templates with no aligned counterpart that were dropped
    pub templates_missing_excluded: u64,
    /// Primary reads that went through alignment transfer
    pub reads: u64,
    /// Reads whose transferred alignment was kept as-is
    pub reads_mapped: u64,
    /// Reads left unmapped because the aligner did not place them
    pub reads_unmapped_by_aligner: u64,
    /// Reads unmapped because no bases remained aligned after clipping
    pub reads_unmapped_no_aligned_bases: u64,
    /// Reads unmapped because the alignment started past the end of the reference
    pub reads_unmapped_beyond_reference: u64,
    /// Reads flagged as cross-species contamination
    pub reads_contaminant: u64,
    /// Contaminant reads whose alignment was moved into the `PA` tag
    pub reads_contaminant_unmapped: u64,
    /// Pairs whose overlapping ends were clipped
    pub pairs_overlap_clipped: u64,
    /// Read bases soft-clipped to remove pair overlap
    pub bases_overlap_clipped: u64,
    /// Secondary and supplementary alignments that were not carried over
    pub secondary_or_supplementary_skipped: u64,
}

impl Metric for MergeMetrics {
    fn metric_name() -> &'static str {
        "merge"
    }
}

impl MergeMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the outcome of one alignment transfer.
    pub fn record_outcome(&mut self, outcome: TransferOutcome) {
        self.reads += 1;
        match outcome {
            TransferOutcome::Mapped => self.reads_mapped += 1,
            TransferOutcome::DonorUnmapped => self.reads_unmapped_by_aligner += 1,
            TransferOutcome::NoAlignedBases => self.reads_unmapped_no_aligned_bases += 1,
            TransferOutcome::BeyondReferenceEnd => self.reads_unmapped_beyond_reference += 1,
            TransferOutcome::Contaminant(strategy) => {
                self.reads_contaminant += 1;
                if strategy == UnmappingStrategy::MoveToTag {
                    self.reads_contaminant_unmapped += 1;
                }
            }
        }
    }

    /// Counts one pair clipped for overlap, given the bases clipped from each end.
    pub fn record_overlap_clip(&mut self, clipped: (usize, usize)) {
        let bases = clipped.0 + clipped.1;
        if bases > 0 {
            self.pairs_overlap_clipped += 1;
            self.bases_overlap_clipped += bases as u64;
        }
    }

    /// Adds the counts of `other` to this instance.
    pub fn merge(&mut self, other: &MergeMetrics) {
        self.templates += other.templates;
        self.templates_aligned += other.templates_aligned;
        self.templates_missing_passed_through += other.templates_missing_passed_through;
        self.templates_missing_excluded += other.templates_missing_excluded;
        self.reads += other.reads;
        self.reads_mapped += other.reads_mapped;
        self.reads_unmapped_by_aligner += other.reads_unmapped_by_aligner;
        self.reads_unmapped_no_aligned_bases += other.reads_unmapped_no_aligned_bases;
        self.reads_unmapped_beyond_reference += other.reads_unmapped_beyond_reference;
        self.reads_contaminant += other.reads_contaminant;
        self.reads_contaminant_unmapped += other.reads_contaminant_unmapped;
        self.pairs_overlap_clipped += other.pairs_overlap_clipped;
        self.bases_overlap_clipped += other.bases_overlap_clipped;
        self.secondary_or_supplementary_skipped += other.secondary_or_supplementary_skipped;
    }

    /// Fraction of transferred reads that ended up with an alignment.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "read counts never exceed 2^53")]
    pub fn fraction_aligned(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        let aligned = self.reads_mapped + self.reads_contaminant - self.reads_contaminant_unmapped;
        aligned as f64 / self.reads as f64
    }
}

/// Writes metrics to a TSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path = path.as_ref();
    DelimFile::default()
        .write_tsv(&path, metrics)
        .with_context(|| format!("Failed to write {} metrics: {}", T::metric_name(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_record_outcome() {
        let mut metrics = MergeMetrics::new();
        metrics.record_outcome(TransferOutcome::Mapped);
        metrics.record_outcome(TransferOutcome::Mapped);
        metrics.record_outcome(TransferOutcome::DonorUnmapped);
        metrics.record_outcome(TransferOutcome::NoAlignedBases);
        metrics.record_outcome(TransferOutcome::BeyondReferenceEnd);
        metrics.record_outcome(TransferOutcome::Contaminant(UnmappingStrategy::CopyToTag));
        metrics.record_outcome(TransferOutcome::Contaminant(UnmappingStrategy::MoveToTag));

        assert_eq!(metrics.reads, 7);
        assert_eq!(metrics.reads_mapped, 2);
        assert_eq!(metrics.reads_unmapped_by_aligner, 1);
        assert_eq!(metrics.reads_unmapped_no_aligned_bases, 1);
        assert_eq!(metrics.reads_unmapped_beyond_reference, 1);
        assert_eq!(metrics.reads_contaminant, 2);
        assert_eq!(metrics.reads_contaminant_unmapped, 1);
        assert!((metrics.fraction_aligned() - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_overlap_clip_ignores_unclipped_pairs() {
        let mut metrics = MergeMetrics::new();
        metrics.record_overlap_clip((0, 0));
        metrics.record_overlap_clip((10, 10));
        metrics.record_overlap_clip((0, 5));
        assert_eq!(metrics.pairs_overlap_clipped, 2);
        assert_eq!(metrics.bases_overlap_clipped, 25);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut a = MergeMetrics { templates: 2, reads: 4, reads_mapped: 3, ..Default::default() };
        let b = MergeMetrics { templates: 1, reads: 2, reads_mapped: 1, ..Default::default() };
        a.merge(&b);
        assert_eq!(a.templates, 3);
        assert_eq!(a.reads, 6);
        assert_eq!(a.reads_mapped, 4);
    }

    #[test]
    fn test_fraction_aligned_empty() {
        assert!(MergeMetrics::new().fraction_aligned().abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let file = NamedTempFile::new()?;
        let metrics = MergeMetrics { templates: 5, reads: 10, reads_mapped: 9, ..Default::default() };
        write_metrics(file.path(), std::slice::from_ref(&metrics))?;

        let read: Vec<MergeMetrics> = DelimFile::default().read_tsv(&file.path())?;
        assert_eq!(read, vec![metrics]);

        let text = std::fs::read_to_string(file.path())?;
        assert!(text.starts_with("templates\ttemplates_aligned\t"));
        Ok(())
    }
}
