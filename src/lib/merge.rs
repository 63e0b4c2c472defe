//! Merging aligned templates back onto their unmapped originals.
//!
//! For every template the [`Merger`] transfers each primary aligned read onto the matching
//! unmapped read, recomputes mate information for pairs, and optionally soft clips the portion
//! of a pair where the two reads overlap. Reads whose alignments look like cross-species
//! contamination (too few aligned bases) are handled by the configured
//! [`UnmappingStrategy`](fgmerge_sam::UnmappingStrategy).
//!
//! Only primary alignments are carried over; secondary and supplementary records of the aligned
//! template are counted and dropped.

use fgmerge_sam::cigar::is_clip;
use fgmerge_sam::dna::reverse_complement;
use fgmerge_sam::tags::{ADAPTER_START, buf_value_as_i64};
use fgmerge_sam::{
    TransferOptions, TransferOutcome, clip_overlap, set_mate_info, transfer_alignment,
};
use log::debug;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::{QualityScores, Sequence};

use crate::errors::{MergeError, Result};
use crate::metrics::MergeMetrics;
use crate::template::Template;

/// Default minimum number of unclipped bases for an alignment not to be a contaminant.
pub const DEFAULT_MIN_UNCLIPPED_BASES: usize = 32;

/// Decides whether an alignment is too heavily clipped to be trusted.
///
/// An alignment is overclipped when fewer than `min_unclipped_bases` of its CIGAR length are
/// outside clip operations and, unless `filter_single_end_clips` is set, it is clipped at both
/// ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContaminationCheck {
    /// Minimum number of CIGAR bases outside clips
    pub min_unclipped_bases: usize,
    /// Also flag alignments clipped at only one end
    pub filter_single_end_clips: bool,
}

impl Default for ContaminationCheck {
    fn default() -> Self {
        Self { min_unclipped_bases: DEFAULT_MIN_UNCLIPPED_BASES, filter_single_end_clips: false }
    }
}

impl ContaminationCheck {
    /// True if a mapped record is overclipped. Unmapped records never are.
    #[must_use]
    pub fn is_overclipped(&self, record: &RecordBuf) -> bool {
        if record.flags().is_unmapped() {
            return false;
        }

        let ops = record.cigar().as_ref();
        let unclipped: usize = ops.iter().filter(|op| !is_clip(op.kind())).map(|op| op.len()).sum();
        if unclipped >= self.min_unclipped_bases {
            return false;
        }

        self.filter_single_end_clips
            || (ops.first().is_some_and(|op| is_clip(op.kind()))
                && ops.last().is_some_and(|op| is_clip(op.kind())))
    }

    /// True if a fragment alignment is a contaminant.
    #[must_use]
    pub fn is_contaminant_fragment(&self, read: &RecordBuf) -> bool {
        self.is_overclipped(read)
    }

    /// True if at least one end of the pair is mapped and every mapped end is overclipped.
    #[must_use]
    pub fn is_contaminant_pair(&self, r1: &RecordBuf, r2: &RecordBuf) -> bool {
        let mapped: Vec<&RecordBuf> =
            [r1, r2].into_iter().filter(|r| !r.flags().is_unmapped()).collect();
        !mapped.is_empty() && mapped.iter().all(|r| self.is_overclipped(r))
    }
}

/// Options controlling a merge.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Options passed to every alignment transfer
    pub transfer: TransferOptions,
    /// Contamination detection; `None` disables it
    pub contamination: Option<ContaminationCheck>,
    /// Soft clip the overlapping portion of pairs
    pub clip_overlapping_reads: bool,
    /// Soft clip adapter sequence marked by the `XT` tag
    pub clip_adapters: bool,
    /// Drop unmapped templates that have no aligned counterpart
    pub exclude_missing_reads: bool,
}

/// Merges aligned templates onto unmapped templates, collecting [`MergeMetrics`].
pub struct Merger {
    options: MergeOptions,
    header: Header,
    metrics: MergeMetrics,
}

impl Merger {
    /// Creates a merger; `header` supplies the reference names and lengths of the output.
    #[must_use]
    pub fn new(options: MergeOptions, header: Header) -> Self {
        Self { options, header, metrics: MergeMetrics::new() }
    }

    /// The options this merger was created with.
    #[must_use]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    #[must_use]
    pub fn metrics(&self) -> &MergeMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn into_metrics(self) -> MergeMetrics {
        self.metrics
    }

    /// Handles an unmapped template with no aligned counterpart: its records are returned
    /// unchanged, or dropped when missing reads are excluded.
    pub fn pass_through(&mut self, unmapped: Template) -> Vec<RecordBuf> {
        self.metrics.templates += 1;
        debug!("No aligned records for template: {}", unmapped.name_str());
        if self.options.exclude_missing_reads {
            self.metrics.templates_missing_excluded += 1;
            Vec::new()
        } else {
            self.metrics.templates_missing_passed_through += 1;
            unmapped.into_records()
        }
    }

    /// Merges one aligned template onto its unmapped template and returns the output records.
    ///
    /// A primary read missing from the aligned template is treated as left unmapped by the
    /// aligner.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::TemplateMismatch`] if the names differ and
    /// [`MergeError::InvalidTemplate`] if the unmapped template lacks a primary read.
    pub fn merge_template(&mut self, unmapped: Template, aligned: &Template) -> Result<Vec<RecordBuf>> {
        if unmapped.name != aligned.name {
            return Err(MergeError::TemplateMismatch {
                unmapped: unmapped.name_str(),
                aligned: aligned.name_str(),
            });
        }

        self.metrics.templates += 1;
        self.metrics.templates_aligned += 1;
        self.metrics.secondary_or_supplementary_skipped +=
            aligned.secondary_and_supplementary_count() as u64;

        let name = unmapped.name_str();
        let paired = unmapped.is_paired();
        let unplaced = unplaced_donor();

        match unmapped.into_primary_reads() {
            (Some(r1), Some(r2)) if paired => {
                let a1 = aligned.r1().unwrap_or(&unplaced);
                let a2 = aligned.r2().unwrap_or(&unplaced);
                Ok(self.merge_pair(r1, r2, a1, a2).into())
            }
            (Some(read), None) if !paired => {
                let donor = aligned.r1().unwrap_or(&unplaced);
                let contaminant =
                    self.options.contamination.is_some_and(|c| c.is_contaminant_fragment(donor));
                Ok(vec![self.transfer_read(read, donor, contaminant, false)])
            }
            _ => Err(MergeError::InvalidTemplate {
                name,
                reason: if paired {
                    "paired template must have a primary R1 and R2".to_string()
                } else {
                    "fragment template must have exactly one primary read".to_string()
                },
            }),
        }
    }

    fn merge_pair(
        &mut self,
        r1: RecordBuf,
        r2: RecordBuf,
        a1: &RecordBuf,
        a2: &RecordBuf,
    ) -> [RecordBuf; 2] {
        let contaminant = self.options.contamination.is_some_and(|c| c.is_contaminant_pair(a1, a2));
        let mut r1 = self.transfer_read(r1, a1, contaminant, true);
        let mut r2 = self.transfer_read(r2, a2, contaminant, true);

        let fix_mates =
            !contaminant || self.options.transfer.unmapping_strategy.recomputes_mate_info();
        if fix_mates {
            set_mate_info(&mut r1, &mut r2);
        }

        let both_mapped = !r1.flags().is_unmapped() && !r2.flags().is_unmapped();
        if self.options.clip_overlapping_reads && both_mapped {
            let clipped = clip_overlap(&mut r1, &mut r2);
            self.metrics.record_overlap_clip(clipped);
            // mate fields must follow the clipped alignments whatever the strategy
            if clipped != (0, 0) {
                set_mate_info(&mut r1, &mut r2);
            }
        }

        [r1, r2]
    }

    fn transfer_read(
        &mut self,
        mut recipient: RecordBuf,
        donor: &RecordBuf,
        is_contaminant: bool,
        is_paired_end: bool,
    ) -> RecordBuf {
        let recipient_was_negative = recipient.flags().is_reverse_complemented();
        orient_to_donor(&mut recipient, donor);

        self.options.transfer.clip_adapter_length =
            if self.options.clip_adapters { adapter_clip_length(&recipient) } else { 0 };

        let outcome = transfer_alignment(
            &mut recipient,
            donor,
            is_contaminant,
            is_paired_end,
            recipient_was_negative,
            &self.options.transfer,
            &self.header,
        );

        if outcome != TransferOutcome::Mapped {
            debug!(
                "Read {} transferred with outcome {outcome:?}",
                recipient.name().map(ToString::to_string).unwrap_or_default()
            );
        }
        self.metrics.record_outcome(outcome);
        recipient
    }
}

/// Stand-in for a read the aligner did not report.
fn unplaced_donor() -> RecordBuf {
    let mut record = RecordBuf::default();
    *record.flags_mut() = Flags::UNMAPPED;
    record
}

/// Stores the read's bases and qualities in the orientation of the donor's alignment: reverse
/// complemented for a reverse-strand donor, forward otherwise. The strand flag itself is left to
/// the transfer.
pub fn orient_to_donor(record: &mut RecordBuf, donor: &RecordBuf) {
    let donor_negative = !donor.flags().is_unmapped() && donor.flags().is_reverse_complemented();
    if record.flags().is_reverse_complemented() == donor_negative {
        return;
    }

    let bases = reverse_complement(record.sequence().as_ref());
    *record.sequence_mut() = Sequence::from(bases);

    let mut quals = record.quality_scores().as_ref().to_vec();
    quals.reverse();
    *record.quality_scores_mut() = QualityScores::from(quals);
}

/// Number of 3' bases to clip as adapter, from the 1-based adapter start in the `XT` tag.
#[must_use]
pub fn adapter_clip_length(record: &RecordBuf) -> usize {
    let read_length = record.sequence().len();
    record
        .data()
        .get(&ADAPTER_START)
        .and_then(buf_value_as_i64)
        .and_then(|start| usize::try_from(start).ok())
        .filter(|start| *start >= 1)
        .map_or(0, |start| (read_length + 1).saturating_sub(start).min(read_length))
}
