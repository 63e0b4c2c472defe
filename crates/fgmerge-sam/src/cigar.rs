//! CIGAR helpers shared by the overlap clipper and the alignment transfer engine.
//!
//! CIGARs are handled as plain `&[Op]` slices (what `RecordBuf::cigar().as_ref()` yields) and
//! rebuilt as `Vec<Op>`. Strings use the SAM grammar: `<length><op>` tokens with ops from
//! `MIDNSHP=X`, and `*` for an empty CIGAR.

use std::fmt::Write;

use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use thiserror::Error;

/// Error returned when a CIGAR string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CigarParseError {
    /// An operation character was not preceded by a length
    #[error("Invalid CIGAR '{cigar}': operation '{op}' has no length")]
    MissingLength {
        /// The offending CIGAR string
        cigar: String,
        /// The operation character
        op: char,
    },

    /// A character outside `MIDNSHP=X` was found
    #[error("Invalid CIGAR '{cigar}': unknown operation '{op}'")]
    UnknownOperation {
        /// The offending CIGAR string
        cigar: String,
        /// The unknown character
        op: char,
    },

    /// The string ended with a length that has no operation
    #[error("Invalid CIGAR '{cigar}': trailing length with no operation")]
    TrailingLength {
        /// The offending CIGAR string
        cigar: String,
    },
}

/// Returns the SAM character for a CIGAR operation kind.
#[must_use]
pub const fn kind_to_char(kind: Kind) -> char {
    match kind {
        Kind::Match => 'M',
        Kind::Insertion => 'I',
        Kind::Deletion => 'D',
        Kind::Skip => 'N',
        Kind::SoftClip => 'S',
        Kind::HardClip => 'H',
        Kind::Pad => 'P',
        Kind::SequenceMatch => '=',
        Kind::SequenceMismatch => 'X',
    }
}

/// Returns the CIGAR operation kind for a SAM character, if valid.
#[must_use]
pub const fn char_to_kind(c: char) -> Option<Kind> {
    match c {
        'M' => Some(Kind::Match),
        'I' => Some(Kind::Insertion),
        'D' => Some(Kind::Deletion),
        'N' => Some(Kind::Skip),
        'S' => Some(Kind::SoftClip),
        'H' => Some(Kind::HardClip),
        'P' => Some(Kind::Pad),
        '=' => Some(Kind::SequenceMatch),
        'X' => Some(Kind::SequenceMismatch),
        _ => None,
    }
}

/// Parses a SAM CIGAR string into operations.
///
/// Both `*` and the empty string parse to an empty CIGAR.
///
/// # Errors
///
/// Returns a [`CigarParseError`] if the string is not a valid CIGAR.
///
/// # Examples
///
/// ```
/// use fgmerge_sam::cigar::{cigar_to_string, parse_cigar};
///
/// let ops = parse_cigar("5H15S105M").unwrap();
/// assert_eq!(ops.len(), 3);
/// assert_eq!(cigar_to_string(&ops), "5H15S105M");
/// assert!(parse_cigar("*").unwrap().is_empty());
/// ```
pub fn parse_cigar(cigar: &str) -> Result<Vec<Op>, CigarParseError> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut len: Option<usize> = None;

    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            len = Some(len.unwrap_or(0) * 10 + digit as usize);
            continue;
        }

        let kind = char_to_kind(c)
            .ok_or_else(|| CigarParseError::UnknownOperation { cigar: cigar.to_string(), op: c })?;
        let n = len
            .take()
            .ok_or_else(|| CigarParseError::MissingLength { cigar: cigar.to_string(), op: c })?;
        ops.push(Op::new(kind, n));
    }

    if len.is_some() {
        return Err(CigarParseError::TrailingLength { cigar: cigar.to_string() });
    }

    Ok(ops)
}

/// Formats CIGAR operations as a SAM CIGAR string, `*` when empty.
#[must_use]
pub fn cigar_to_string(ops: &[Op]) -> String {
    if ops.is_empty() {
        return String::from("*");
    }

    let mut result = String::with_capacity(ops.len() * 4);
    for op in ops {
        let _ = write!(result, "{}{}", op.len(), kind_to_char(op.kind()));
    }
    result
}

/// True for operations that consume bases of the stored read sequence.
#[must_use]
pub const fn consumes_read(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match
            | Kind::Insertion
            | Kind::SoftClip
            | Kind::SequenceMatch
            | Kind::SequenceMismatch
    )
}

/// True for operations that consume reference bases.
#[must_use]
pub const fn consumes_reference(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
    )
}

/// True for operations that align a read base to a reference base.
#[must_use]
pub const fn is_aligned(kind: Kind) -> bool {
    matches!(kind, Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch)
}

/// True for soft and hard clips.
#[must_use]
pub const fn is_clip(kind: Kind) -> bool {
    matches!(kind, Kind::SoftClip | Kind::HardClip)
}

/// Number of reference bases spanned by the alignment.
#[must_use]
pub fn reference_length(ops: &[Op]) -> usize {
    ops.iter().filter(|op| consumes_reference(op.kind())).map(|op| op.len()).sum()
}

/// Number of stored read bases described by the CIGAR (hard clips excluded).
#[must_use]
pub fn read_length(ops: &[Op]) -> usize {
    ops.iter().filter(|op| consumes_read(op.kind())).map(|op| op.len()).sum()
}

/// Number of read bases aligned to the reference (`M`, `=`, `X`).
#[must_use]
pub fn aligned_bases(ops: &[Op]) -> usize {
    ops.iter().filter(|op| is_aligned(op.kind())).map(|op| op.len()).sum()
}

/// Number of soft and hard clipped bases.
#[must_use]
pub fn clipped_bases(ops: &[Op]) -> usize {
    ops.iter().filter(|op| is_clip(op.kind())).map(|op| op.len()).sum()
}

/// Inclusive 1-based reference end for an alignment starting at `start`.
///
/// Returns `None` if the CIGAR spans no reference bases.
#[must_use]
pub fn alignment_end(start: usize, ops: &[Op]) -> Option<usize> {
    match reference_length(ops) {
        0 => None,
        len => Some(start + len - 1),
    }
}

/// Appends `op`, merging it into the last operation when both have the same kind.
///
/// Zero-length operations are dropped.
pub fn push_or_merge(ops: &mut Vec<Op>, op: Op) {
    if op.len() == 0 {
        return;
    }
    match ops.last_mut() {
        Some(last) if last.kind() == op.kind() => *last = Op::new(op.kind(), last.len() + op.len()),
        _ => ops.push(op),
    }
}

/// Prepends `op`, merging it into the first operation when both have the same kind.
///
/// Zero-length operations are dropped.
pub fn push_front_or_merge(ops: &mut Vec<Op>, op: Op) {
    if op.len() == 0 {
        return;
    }
    match ops.first_mut() {
        Some(first) if first.kind() == op.kind() => {
            *first = Op::new(op.kind(), first.len() + op.len());
        }
        _ => ops.insert(0, op),
    }
}

/// Adds `len` bases of soft clip at the start of the CIGAR, inside any leading hard clip.
#[must_use]
pub fn add_leading_soft_clip(ops: &[Op], len: usize) -> Vec<Op> {
    let n_hard = ops.iter().take_while(|op| op.kind() == Kind::HardClip).count();
    let mut result: Vec<Op> = Vec::with_capacity(ops.len() + 1);
    for op in &ops[..n_hard] {
        push_or_merge(&mut result, *op);
    }
    push_or_merge(&mut result, Op::new(Kind::SoftClip, len));
    for op in &ops[n_hard..] {
        push_or_merge(&mut result, *op);
    }
    result
}

/// Adds `len` bases of soft clip at the end of the CIGAR, inside any trailing hard clip.
#[must_use]
pub fn add_trailing_soft_clip(ops: &[Op], len: usize) -> Vec<Op> {
    let n_hard = ops.iter().rev().take_while(|op| op.kind() == Kind::HardClip).count();
    let split = ops.len() - n_hard;
    let mut result: Vec<Op> = Vec::with_capacity(ops.len() + 1);
    for op in &ops[..split] {
        push_or_merge(&mut result, *op);
    }
    push_or_merge(&mut result, Op::new(Kind::SoftClip, len));
    for op in &ops[split..] {
        push_or_merge(&mut result, *op);
    }
    result
}
