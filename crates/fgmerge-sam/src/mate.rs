//! Mate information fix-up for read pairs.
//!
//! Follows htsjdk's `SamPairUtil.setMateInfo`: mate coordinates, mate strand and unmapped flags,
//! `MQ`, `MC`, `ms` and `TLEN` are all derived from the final state of the two mates.

use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;

use crate::cigar::{alignment_end, cigar_to_string};
use crate::tags::{
    ALIGNMENT_SCORE, MATE_CIGAR, MATE_MAPPING_QUALITY, MATE_SCORE, buf_value_as_i64,
    to_smallest_signed_int,
};

/// The mate fields one record publishes to the other.
struct MateView {
    reference_sequence_id: Option<usize>,
    alignment_start: Option<noodles::core::Position>,
    is_reverse: bool,
    mapping_quality: i32,
    cigar: String,
    score: Option<i32>,
}

impl MateView {
    fn of(record: &RecordBuf) -> Self {
        Self {
            reference_sequence_id: record.reference_sequence_id(),
            alignment_start: record.alignment_start(),
            is_reverse: record.flags().is_reverse_complemented(),
            mapping_quality: record.mapping_quality().map_or(255, |mq| i32::from(u8::from(mq))),
            cigar: cigar_to_string(record.cigar().as_ref()),
            score: record
                .data()
                .get(&ALIGNMENT_SCORE)
                .and_then(buf_value_as_i64)
                .and_then(|n| i32::try_from(n).ok()),
        }
    }
}

fn set_mate_flags(record: &mut RecordBuf, mate_is_reverse: bool, mate_is_unmapped: bool) {
    let flags = record.flags_mut();
    flags.set(Flags::MATE_REVERSE_COMPLEMENTED, mate_is_reverse);
    flags.set(Flags::MATE_UNMAPPED, mate_is_unmapped);
}

fn remove_mate_tags(record: &mut RecordBuf) {
    let data = record.data_mut();
    data.remove(&MATE_MAPPING_QUALITY);
    data.remove(&MATE_CIGAR);
    data.remove(&MATE_SCORE);
}

/// Publishes `mate` onto `record` as its mapped mate.
fn apply_mapped_mate(record: &mut RecordBuf, mate: &MateView) {
    *record.mate_reference_sequence_id_mut() = mate.reference_sequence_id;
    *record.mate_alignment_start_mut() = mate.alignment_start;
    set_mate_flags(record, mate.is_reverse, false);

    let data = record.data_mut();
    data.insert(MATE_MAPPING_QUALITY, to_smallest_signed_int(mate.mapping_quality));
    if mate.cigar == "*" {
        data.remove(&MATE_CIGAR);
    } else {
        data.insert(MATE_CIGAR, BufValue::from(mate.cigar.clone()));
    }
    match mate.score {
        Some(score) => data.insert(MATE_SCORE, to_smallest_signed_int(score)),
        None => data.remove(&MATE_SCORE),
    };
}

/// Sets the mate fields of each record of a pair from the other.
///
/// - Both mapped: mate reference, start and strand, `MQ`, `MC`, `ms` and `TLEN` are set on both.
/// - Both unmapped: coordinates are cleared, mate tags dropped and `TLEN` zeroed.
/// - One unmapped: the unmapped read is placed at its mate's reference and start, both records
///   point at those coordinates, only the unmapped read carries `MQ`/`MC` and `TLEN` is zero.
pub fn set_mate_info(r1: &mut RecordBuf, r2: &mut RecordBuf) {
    let r1_unmapped = r1.flags().is_unmapped();
    let r2_unmapped = r2.flags().is_unmapped();

    match (r1_unmapped, r2_unmapped) {
        (false, false) => {
            let (v1, v2) = (MateView::of(r1), MateView::of(r2));
            apply_mapped_mate(r1, &v2);
            apply_mapped_mate(r2, &v1);

            let tlen = insert_size(r1, r2);
            *r1.template_length_mut() = tlen;
            *r2.template_length_mut() = -tlen;
        }
        (true, true) => {
            let r1_reverse = r1.flags().is_reverse_complemented();
            let r2_reverse = r2.flags().is_reverse_complemented();
            for (record, mate_reverse) in [(&mut *r1, r2_reverse), (&mut *r2, r1_reverse)] {
                *record.reference_sequence_id_mut() = None;
                *record.alignment_start_mut() = None;
                *record.mate_reference_sequence_id_mut() = None;
                *record.mate_alignment_start_mut() = None;
                set_mate_flags(record, mate_reverse, true);
                remove_mate_tags(record);
                *record.template_length_mut() = 0;
            }
        }
        (true, false) => set_mate_info_one_unmapped(r2, r1),
        (false, true) => set_mate_info_one_unmapped(r1, r2),
    }
}

fn set_mate_info_one_unmapped(mapped: &mut RecordBuf, unmapped: &mut RecordBuf) {
    let view = MateView::of(mapped);

    *unmapped.reference_sequence_id_mut() = view.reference_sequence_id;
    *unmapped.alignment_start_mut() = view.alignment_start;

    *mapped.mate_reference_sequence_id_mut() = view.reference_sequence_id;
    *mapped.mate_alignment_start_mut() = view.alignment_start;
    let unmapped_reverse = unmapped.flags().is_reverse_complemented();
    set_mate_flags(mapped, unmapped_reverse, true);
    remove_mate_tags(mapped);
    *mapped.template_length_mut() = 0;

    apply_mapped_mate(unmapped, &view);
    *unmapped.template_length_mut() = 0;
}

/// Insert size between two mapped reads on the same reference, computed from their 5' ends
/// (alignment start on the forward strand, alignment end on the reverse strand). Zero when
/// either read is unmapped or the reads are on different references.
#[must_use]
pub fn insert_size(r1: &RecordBuf, r2: &RecordBuf) -> i32 {
    if r1.flags().is_unmapped()
        || r2.flags().is_unmapped()
        || r1.reference_sequence_id() != r2.reference_sequence_id()
    {
        return 0;
    }

    let (Some(five_prime_1), Some(five_prime_2)) = (five_prime_position(r1), five_prime_position(r2))
    else {
        return 0;
    };

    let adjustment = if five_prime_2 >= five_prime_1 { 1 } else { -1 };
    let size = five_prime_2 - five_prime_1 + adjustment;
    i32::try_from(size).unwrap_or(0)
}

fn five_prime_position(record: &RecordBuf) -> Option<i64> {
    let start = usize::from(record.alignment_start()?);
    let position = if record.flags().is_reverse_complemented() {
        alignment_end(start, record.cigar().as_ref()).unwrap_or(start)
    } else {
        start
    };
    i64::try_from(position).ok()
}
