//! Soft clipping of aligned reads.
//!
//! All clipping here is soft: bases and qualities are untouched, aligned CIGAR operations are
//! converted to `S`, existing soft clips are merged into and hard clips stay outermost. Clipping
//! at the start of an alignment moves the alignment start forward by the number of reference
//! bases removed.
//!
//! [`clip_overlap`] uses these to clip a read pair so that neither mate claims aligned bases past
//! its mate's aligned span.

use noodles::core::Position;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record_buf::Cigar;

use crate::cigar::{
    consumes_read, consumes_reference, is_clip, push_or_merge, reference_length,
};

/// The result of clipping one end of a CIGAR.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClippedOps {
    ops: Vec<Op>,
    read_bases: usize,
    reference_bases: usize,
}

/// Soft clips `bases_to_clip` read bases from the leading end of `ops`, beyond any existing
/// clipping. Trailing clips are never consumed.
fn clip_leading_ops(ops: &[Op], bases_to_clip: usize) -> ClippedOps {
    let hard_clip: usize = ops
        .iter()
        .take_while(|op| op.kind() == Kind::HardClip)
        .map(|op| op.len())
        .sum();
    let n_leading = ops.iter().take_while(|op| is_clip(op.kind())).count();
    let soft_clip: usize = ops[..n_leading]
        .iter()
        .filter(|op| op.kind() == Kind::SoftClip)
        .map(|op| op.len())
        .sum();
    let n_trailing = ops[n_leading..].iter().rev().take_while(|op| is_clip(op.kind())).count();
    let body = &ops[n_leading..ops.len() - n_trailing];
    let trailing = &ops[ops.len() - n_trailing..];

    let mut read_bases = 0;
    let mut reference_bases = 0;
    let mut remaining: Vec<Op> = Vec::with_capacity(body.len());
    let mut body_iter = body.iter().copied().peekable();

    loop {
        let at_target = read_bases >= bases_to_clip;
        let next_is_indel = body_iter
            .peek()
            .is_some_and(|op| matches!(op.kind(), Kind::Deletion | Kind::Insertion));
        if at_target && !next_is_indel {
            break;
        }
        let Some(op) = body_iter.next() else { break };
        let (kind, len) = (op.kind(), op.len());

        if at_target {
            // indels may not sit next to a clip
            if kind == Kind::Deletion {
                reference_bases += len;
            } else {
                read_bases += len;
            }
        } else if kind == Kind::Insertion && len > bases_to_clip - read_bases {
            // clipped whole; indels behind it are taken on the next pass
            read_bases += len;
        } else if consumes_read(kind) && len > bases_to_clip - read_bases {
            let n = bases_to_clip - read_bases;
            read_bases += n;
            if consumes_reference(kind) {
                reference_bases += n;
            }
            remaining.push(Op::new(kind, len - n));
            break;
        } else {
            if consumes_read(kind) {
                read_bases += len;
            }
            if consumes_reference(kind) {
                reference_bases += len;
            }
        }
    }
    remaining.extend(body_iter);

    let mut clipped = Vec::with_capacity(remaining.len() + trailing.len() + 2);
    push_or_merge(&mut clipped, Op::new(Kind::HardClip, hard_clip));
    push_or_merge(&mut clipped, Op::new(Kind::SoftClip, soft_clip + read_bases));
    for op in remaining.into_iter().chain(trailing.iter().copied()) {
        push_or_merge(&mut clipped, op);
    }

    ClippedOps { ops: clipped, read_bases, reference_bases }
}

fn clip_trailing_ops(ops: &[Op], bases_to_clip: usize) -> ClippedOps {
    let reversed: Vec<Op> = ops.iter().rev().copied().collect();
    let mut clipped = clip_leading_ops(&reversed, bases_to_clip);
    clipped.ops.reverse();
    clipped
}

fn is_clippable(record: &RecordBuf) -> bool {
    !record.flags().is_unmapped() && !record.cigar().as_ref().is_empty()
}

/// Soft clips `bases_to_clip` read bases from the start (left end) of the alignment, on top of
/// any existing clipping, and moves the alignment start past the clipped reference bases.
///
/// Insertions at or across the clip boundary are clipped whole and deletions left at the new
/// boundary are removed. Returns the number of read bases newly clipped, which may exceed
/// `bases_to_clip` when an insertion is absorbed.
pub fn clip_start_of_alignment(record: &mut RecordBuf, bases_to_clip: usize) -> usize {
    if bases_to_clip == 0 || !is_clippable(record) {
        return 0;
    }

    let clipped = clip_leading_ops(record.cigar().as_ref(), bases_to_clip);
    *record.cigar_mut() = Cigar::from(clipped.ops);

    if clipped.reference_bases > 0 {
        if let Some(start) = record.alignment_start() {
            *record.alignment_start_mut() =
                Position::new(usize::from(start) + clipped.reference_bases);
        }
    }

    clipped.read_bases
}

/// Soft clips `bases_to_clip` read bases from the end (right end) of the alignment, on top of
/// any existing clipping. The alignment start is unchanged.
pub fn clip_end_of_alignment(record: &mut RecordBuf, bases_to_clip: usize) -> usize {
    if bases_to_clip == 0 || !is_clippable(record) {
        return 0;
    }

    let clipped = clip_trailing_ops(record.cigar().as_ref(), bases_to_clip);
    *record.cigar_mut() = Cigar::from(clipped.ops);
    clipped.read_bases
}

/// Soft clips read bases from the 3' end of the read: the end of the alignment for a forward
/// strand read, the start for a reverse strand read.
pub fn clip_3_prime_end_of_alignment(record: &mut RecordBuf, bases_to_clip: usize) -> usize {
    if record.flags().is_reverse_complemented() {
        clip_start_of_alignment(record, bases_to_clip)
    } else {
        clip_end_of_alignment(record, bases_to_clip)
    }
}

/// Soft clips read bases from the 5' end of the read.
pub fn clip_5_prime_end_of_alignment(record: &mut RecordBuf, bases_to_clip: usize) -> usize {
    if record.flags().is_reverse_complemented() {
        clip_end_of_alignment(record, bases_to_clip)
    } else {
        clip_start_of_alignment(record, bases_to_clip)
    }
}

/// Number of read bases that cover the first (`from_start`) or last `ref_bases` reference bases
/// of an alignment. Insertions inside the region count, deletions and skips do not.
#[must_use]
pub fn query_bases_for_reference_bases(ops: &[Op], ref_bases: usize, from_start: bool) -> usize {
    let body: Box<dyn Iterator<Item = &Op>> =
        if from_start { Box::new(ops.iter()) } else { Box::new(ops.iter().rev()) };

    let mut remaining = ref_bases;
    let mut query_bases = 0;

    for op in body.filter(|op| !is_clip(op.kind())) {
        if remaining == 0 {
            break;
        }
        let (kind, len) = (op.kind(), op.len());
        if consumes_reference(kind) {
            let n = len.min(remaining);
            remaining -= n;
            if consumes_read(kind) {
                query_bases += n;
            }
        } else if consumes_read(kind) {
            query_bases += len;
        }
    }

    query_bases
}

/// 1-based inclusive reference span of a mapped record.
fn reference_span(record: &RecordBuf) -> Option<(usize, usize)> {
    if record.flags().is_unmapped() {
        return None;
    }
    let start = usize::from(record.alignment_start()?);
    match reference_length(record.cigar().as_ref()) {
        0 => None,
        len => Some((start, start + len - 1)),
    }
}

/// Clips the overlapping ends of an inward facing read pair.
///
/// The forward strand mate is soft clipped at its alignment end by the reference bases it
/// extends past the end of the reverse strand mate, and the reverse strand mate is soft clipped
/// at its alignment start by the reference bases it extends before the start of the forward
/// strand mate. Returns the read bases newly clipped on `(mate1, mate2)`.
///
/// Pairs that are not both mapped to the same reference on opposite strands, or that do not
/// face each other, are left untouched and `(0, 0)` is returned.
pub fn clip_overlap(mate1: &mut RecordBuf, mate2: &mut RecordBuf) -> (usize, usize) {
    if mate1.reference_sequence_id().is_none()
        || mate1.reference_sequence_id() != mate2.reference_sequence_id()
    {
        return (0, 0);
    }

    match (mate1.flags().is_reverse_complemented(), mate2.flags().is_reverse_complemented()) {
        (false, true) => clip_inward_pair(mate1, mate2),
        (true, false) => {
            let (pos, neg) = clip_inward_pair(mate2, mate1);
            (neg, pos)
        }
        _ => (0, 0),
    }
}

/// Returns bases clipped on `(pos, neg)`.
fn clip_inward_pair(pos: &mut RecordBuf, neg: &mut RecordBuf) -> (usize, usize) {
    let (Some((pos_start, pos_end)), Some((neg_start, neg_end))) =
        (reference_span(pos), reference_span(neg))
    else {
        return (0, 0);
    };

    if pos_start >= neg_end {
        return (0, 0);
    }

    let pos_clipped = match pos_end.saturating_sub(neg_end) {
        0 => 0,
        overhang => {
            let n = query_bases_for_reference_bases(pos.cigar().as_ref(), overhang, false);
            clip_end_of_alignment(pos, n)
        }
    };

    let neg_clipped = match pos_start.saturating_sub(neg_start) {
        0 => 0,
        overhang => {
            let n = query_bases_for_reference_bases(neg.cigar().as_ref(), overhang, true);
            clip_start_of_alignment(neg, n)
        }
    };

    (pos_clipped, neg_clipped)
}
