//! Transfer of an aligner's result onto the original unaligned read.
//!
//! The donor is the aligned record produced by the aligner; the recipient is the original
//! unaligned read, which keeps its name, bases, qualities and selected tags and takes on the
//! donor's alignment. Reads judged to be cross-species contaminants are annotated and optionally
//! unmapped again according to an [`UnmappingStrategy`].

use std::fmt;
use std::str::FromStr;

use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{Cigar, Data};

use crate::cigar::{
    add_leading_soft_clip, add_trailing_soft_clip, aligned_bases, alignment_end,
    cigar_to_string, read_length,
};
use crate::clipper::{
    clip_3_prime_end_of_alignment, clip_end_of_alignment, query_bases_for_reference_bases,
};
use crate::tags::{
    ALIGNMENT_SCORE, COMMENT, EDIT_DISTANCE, MATE_CIGAR, MATE_MAPPING_QUALITY, MATE_SCORE,
    PREVIOUS_ALIGNMENT, PROGRAM, SUBOPTIMAL_SCORE, TagInfo, buf_value_to_smallest_signed_int,
    buf_value_to_string, is_reserved_tag, revcomp_buf_value, reverse_buf_value,
};

/// Comment appended to the `CO` tag of contaminant reads.
pub const CONTAMINATION_COMMENT: &str = "Cross-species contamination";

const READ_GROUP: Tag = Tag::new(b'R', b'G');

/// Flags describing the read's own alignment, copied from the donor.
const ALIGNMENT_FLAGS: [Flags; 3] =
    [Flags::REVERSE_COMPLEMENTED, Flags::SECONDARY, Flags::SUPPLEMENTARY];

/// Flags describing the mate, copied from the donor for paired reads.
const MATE_FLAGS: [Flags; 3] =
    [Flags::MATE_REVERSE_COMPLEMENTED, Flags::MATE_UNMAPPED, Flags::PROPERLY_SEGMENTED];

/// How a read judged to be a contaminant is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum UnmappingStrategy {
    /// Keep the alignment, but with mapping quality unavailable
    DoNotChange,
    /// Keep the alignment with mapping quality unavailable; the discarded alignment is also
    /// recorded in the `PA` tag and mate information is recomputed for pairs
    #[default]
    CopyToTag,
    /// Unmap the read; the discarded alignment is kept only in the `PA` tag
    MoveToTag,
}

impl UnmappingStrategy {
    /// True if pair level mate information is recomputed after applying this strategy.
    #[must_use]
    pub const fn recomputes_mate_info(self) -> bool {
        !matches!(self, Self::DoNotChange)
    }
}

impl fmt::Display for UnmappingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DoNotChange => "do-not-change",
            Self::CopyToTag => "copy-to-tag",
            Self::MoveToTag => "move-to-tag",
        };
        f.write_str(name)
    }
}

impl FromStr for UnmappingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "do-not-change" => Ok(Self::DoNotChange),
            "copy-to-tag" => Ok(Self::CopyToTag),
            "move-to-tag" => Ok(Self::MoveToTag),
            other => Err(format!("Unknown unmapping strategy: {other}")),
        }
    }
}

/// Parameters of an alignment transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Tags of the unaligned read to keep
    pub tags_to_retain: Vec<Tag>,
    /// Retained tags reversed when the read changes strand
    pub tags_to_reverse: Vec<Tag>,
    /// Retained tags reverse complemented when the read changes strand
    pub tags_to_revcomp: Vec<Tag>,
    /// Read bases at the 3' end of the read to soft clip as adapter
    pub clip_adapter_length: usize,
    /// Value for the `PG` tag, if any
    pub program_group: Option<String>,
    /// Treatment of contaminant reads
    pub unmapping_strategy: UnmappingStrategy,
}

impl TransferOptions {
    /// Builds options from a [`TagInfo`].
    #[must_use]
    pub fn new(tag_info: &TagInfo, unmapping_strategy: UnmappingStrategy) -> Self {
        Self {
            tags_to_retain: tag_info.retain.clone(),
            tags_to_reverse: tag_info.reverse.clone(),
            tags_to_revcomp: tag_info.revcomp.clone(),
            unmapping_strategy,
            ..Self::default()
        }
    }
}

/// What happened to a recipient during [`transfer_alignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The donor's alignment was transferred
    Mapped,
    /// The donor was unmapped, so the recipient is unmapped
    DonorUnmapped,
    /// After clipping no read base was aligned, so the recipient was unmapped
    NoAlignedBases,
    /// The alignment started past the end of its reference, so the recipient was unmapped
    BeyondReferenceEnd,
    /// The read was a contaminant and the strategy was applied
    Contaminant(UnmappingStrategy),
}

impl TransferOutcome {
    /// True if the recipient is left with an alignment.
    #[must_use]
    pub const fn is_mapped(self) -> bool {
        match self {
            Self::Mapped => true,
            Self::Contaminant(strategy) => !matches!(strategy, UnmappingStrategy::MoveToTag),
            Self::DonorUnmapped | Self::NoAlignedBases | Self::BeyondReferenceEnd => false,
        }
    }
}

/// Transfers the alignment of `donor` onto `recipient`.
///
/// `recipient_was_negative` is the strand the recipient's bases were stored on before the
/// transfer; when it differs from the donor's strand the retained tags named in
/// `options.tags_to_reverse` and `options.tags_to_revcomp` are reversed or reverse complemented.
/// `header` supplies reference names and lengths. The recipient's bases and qualities are never
/// changed.
pub fn transfer_alignment(
    recipient: &mut RecordBuf,
    donor: &RecordBuf,
    is_contaminant: bool,
    is_paired_end: bool,
    recipient_was_negative: bool,
    options: &TransferOptions,
    header: &Header,
) -> TransferOutcome {
    let previous_comment = string_tag(recipient.data(), COMMENT);
    let previous_alignments = string_tag(recipient.data(), PREVIOUS_ALIGNMENT);

    let donor_unmapped = donor.flags().is_unmapped();
    let donor_negative = !donor_unmapped && donor.flags().is_reverse_complemented();
    let mut retained = retained_tags(recipient.data(), options);
    if recipient_was_negative != donor_negative {
        flip_tags(&mut retained, options);
    }

    if donor_unmapped {
        make_unmapped(recipient, retained);
        recipient.flags_mut().remove(Flags::REVERSE_COMPLEMENTED);
        return TransferOutcome::DonorUnmapped;
    }

    copy_alignment(recipient, donor, is_paired_end);
    *recipient.data_mut() = merged_tags(retained.clone(), donor, options, is_paired_end);

    if let Some(outcome) = reconcile_cigar(recipient, options, header) {
        make_unmapped(recipient, retained);
        return outcome;
    }

    if let Some(program_group) = &options.program_group {
        recipient.data_mut().insert(PROGRAM, BufValue::from(program_group.as_str()));
    }

    if !is_contaminant {
        return TransferOutcome::Mapped;
    }

    let comment = match previous_comment {
        Some(existing) if !existing.is_empty() => format!("{existing} | {CONTAMINATION_COMMENT}"),
        _ => CONTAMINATION_COMMENT.to_string(),
    };
    let entry = previous_alignment_entry(donor, header);
    let alignments = format!("{}{entry}", previous_alignments.unwrap_or_default());

    let data = recipient.data_mut();
    data.insert(COMMENT, BufValue::from(comment));
    data.insert(PREVIOUS_ALIGNMENT, BufValue::from(alignments));

    let strategy = options.unmapping_strategy;
    match strategy {
        UnmappingStrategy::DoNotChange | UnmappingStrategy::CopyToTag => {
            *recipient.mapping_quality_mut() = None;
        }
        UnmappingStrategy::MoveToTag => {
            clear_alignment(recipient);
            recipient.flags_mut().insert(Flags::UNMAPPED);
            recipient.flags_mut().remove(Flags::PROPERLY_SEGMENTED);
            *recipient.mate_reference_sequence_id_mut() = None;
            *recipient.template_length_mut() = 0;
        }
    }

    TransferOutcome::Contaminant(strategy)
}

fn string_tag(data: &Data, tag: Tag) -> Option<String> {
    match data.get(&tag)? {
        BufValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

/// The recipient's pre-existing tags named in `tags_to_retain`, in their original order.
fn retained_tags(data: &Data, options: &TransferOptions) -> Data {
    data.iter()
        .filter(|(tag, _)| options.tags_to_retain.contains(tag))
        .map(|(tag, value)| (tag, value.clone()))
        .collect()
}

fn flip_tags(data: &mut Data, options: &TransferOptions) {
    for tag in &options.tags_to_reverse {
        if let Some(value) = data.get(tag) {
            let flipped = reverse_buf_value(value);
            data.insert(*tag, flipped);
        }
    }
    for tag in &options.tags_to_revcomp {
        if let Some(value) = data.get(tag) {
            let flipped = revcomp_buf_value(value);
            data.insert(*tag, flipped);
        }
    }
}

/// Tags derived from the mate are recomputed at the pair level, never copied.
fn is_mate_tag(tag: Tag) -> bool {
    tag == MATE_CIGAR || tag == MATE_MAPPING_QUALITY || tag == MATE_SCORE
}

/// Adds the donor's alignment tags to the retained tags; donor values win on collision.
fn merged_tags(
    mut data: Data,
    donor: &RecordBuf,
    options: &TransferOptions,
    is_paired_end: bool,
) -> Data {
    for (tag, value) in donor.data().iter() {
        if is_mate_tag(tag) || tag == READ_GROUP {
            continue;
        }
        if is_reserved_tag(tag) && !options.tags_to_retain.contains(&tag) {
            continue;
        }
        let value = if tag == ALIGNMENT_SCORE || tag == SUBOPTIMAL_SCORE {
            buf_value_to_smallest_signed_int(value).unwrap_or_else(|| value.clone())
        } else {
            value.clone()
        };
        data.insert(tag, value);
    }

    if is_paired_end {
        data.remove(&MATE_CIGAR);
        data.remove(&MATE_MAPPING_QUALITY);
        data.remove(&MATE_SCORE);
    }

    data
}

fn copy_alignment(recipient: &mut RecordBuf, donor: &RecordBuf, is_paired_end: bool) {
    *recipient.reference_sequence_id_mut() = donor.reference_sequence_id();
    *recipient.alignment_start_mut() = donor.alignment_start();
    *recipient.cigar_mut() = donor.cigar().clone();
    *recipient.mapping_quality_mut() = donor.mapping_quality();

    let donor_flags = donor.flags();
    let flags = recipient.flags_mut();
    flags.remove(Flags::UNMAPPED);
    for flag in ALIGNMENT_FLAGS {
        flags.set(flag, donor_flags.contains(flag));
    }

    if is_paired_end {
        for flag in MATE_FLAGS {
            flags.set(flag, donor_flags.contains(flag));
        }
        *recipient.mate_reference_sequence_id_mut() = donor.mate_reference_sequence_id();
        *recipient.mate_alignment_start_mut() = donor.mate_alignment_start();
        *recipient.template_length_mut() = donor.template_length();
    }
}

fn clear_alignment(record: &mut RecordBuf) {
    *record.reference_sequence_id_mut() = None;
    *record.alignment_start_mut() = None;
    *record.cigar_mut() = Cigar::default();
    *record.mapping_quality_mut() = None;
}

/// Unmaps `record`, leaving it only the given tags. The strand flag is kept so that it still
/// describes the orientation of the stored bases.
fn make_unmapped(record: &mut RecordBuf, data: Data) {
    clear_alignment(record);
    let flags = record.flags_mut();
    flags.insert(Flags::UNMAPPED);
    for flag in [Flags::PROPERLY_SEGMENTED, Flags::SECONDARY, Flags::SUPPLEMENTARY] {
        flags.remove(flag);
    }
    *record.template_length_mut() = 0;
    *record.data_mut() = data;
}

/// Fits the transferred CIGAR to the recipient's bases and to the reference. Returns the reason
/// if the read can no longer be aligned.
fn reconcile_cigar(
    recipient: &mut RecordBuf,
    options: &TransferOptions,
    header: &Header,
) -> Option<TransferOutcome> {
    let negative = recipient.flags().is_reverse_complemented();

    // bases trimmed before alignment come back as 3' soft clip
    let read_len = recipient.sequence().len();
    let cigar_len = read_length(recipient.cigar().as_ref());
    if read_len > cigar_len && !recipient.cigar().as_ref().is_empty() {
        let missing = read_len - cigar_len;
        let ops = recipient.cigar().as_ref();
        let padded = if negative {
            add_leading_soft_clip(ops, missing)
        } else {
            add_trailing_soft_clip(ops, missing)
        };
        *recipient.cigar_mut() = Cigar::from(padded);
    }

    if options.clip_adapter_length > 0 {
        let existing = three_prime_soft_clip(recipient);
        let to_clip = options.clip_adapter_length.saturating_sub(existing);
        clip_3_prime_end_of_alignment(recipient, to_clip);
    }

    let start = recipient.alignment_start().map(usize::from)?;
    let reference_length = recipient
        .reference_sequence_id()
        .and_then(|id| header.reference_sequences().get_index(id))
        .map(|(_, reference)| reference.length().get());

    if let Some(reference_length) = reference_length {
        if start > reference_length {
            return Some(TransferOutcome::BeyondReferenceEnd);
        }
        if let Some(end) = alignment_end(start, recipient.cigar().as_ref()) {
            if end > reference_length {
                let overhang = end - reference_length;
                let n = query_bases_for_reference_bases(recipient.cigar().as_ref(), overhang, false);
                clip_end_of_alignment(recipient, n);
            }
        }
    }

    if aligned_bases(recipient.cigar().as_ref()) == 0 {
        return Some(TransferOutcome::NoAlignedBases);
    }

    None
}

/// Soft clipped bases at the 3' end of the read, inside any hard clip.
fn three_prime_soft_clip(record: &RecordBuf) -> usize {
    let ops = record.cigar().as_ref();
    let is_hard = |op: &&Op| op.kind() == Kind::HardClip;
    let is_soft = |op: &&Op| op.kind() == Kind::SoftClip;
    if record.flags().is_reverse_complemented() {
        ops.iter().skip_while(is_hard).take_while(is_soft).map(|op| op.len()).sum()
    } else {
        ops.iter().rev().skip_while(is_hard).take_while(is_soft).map(|op| op.len()).sum()
    }
}

/// `PA` entry for the donor's alignment: `ref,start,cigar,mapq,nm;`.
fn previous_alignment_entry(donor: &RecordBuf, header: &Header) -> String {
    let reference_name = donor
        .reference_sequence_id()
        .and_then(|id| header.reference_sequences().get_index(id))
        .map_or_else(|| String::from("*"), |(name, _)| name.to_string());
    let start = donor.alignment_start().map_or(0, usize::from);
    let cigar = cigar_to_string(donor.cigar().as_ref());
    let mapq = donor.mapping_quality().map_or(255, u8::from);
    let nm = donor.data().get(&EDIT_DISTANCE).map(buf_value_to_string).unwrap_or_default();
    format!("{reference_name},{start},{cigar},{mapq},{nm};")
}
