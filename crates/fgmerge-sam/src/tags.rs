//! Auxiliary tag helpers: parsing tag names, reversing and reverse complementing tag values,
//! and the tag sets that control what survives an alignment merge.

use bstr::BString;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::data::field::value::Array;
use thiserror::Error;

use crate::dna::complement_base;

/// Name that expands to the per-base consensus tags in tag lists.
pub const CONSENSUS_TAG_SET: &str = "Consensus";

/// Per-base consensus tags stored in read order that must be reversed with the read.
pub const CONSENSUS_REVERSE_TAGS: [&str; 5] = ["ad", "ae", "bd", "be", "cd"];

/// Per-base consensus tags holding bases that must be reverse complemented with the read.
pub const CONSENSUS_REVCOMP_TAGS: [&str; 3] = ["aD", "bD", "cD"];

/// Mate cigar tag.
pub const MATE_CIGAR: Tag = Tag::new(b'M', b'C');
/// Mate mapping quality tag.
pub const MATE_MAPPING_QUALITY: Tag = Tag::new(b'M', b'Q');
/// Mate alignment score tag.
pub const MATE_SCORE: Tag = Tag::new(b'm', b's');
/// Alignment score tag.
pub const ALIGNMENT_SCORE: Tag = Tag::new(b'A', b'S');
/// Suboptimal alignment score tag.
pub const SUBOPTIMAL_SCORE: Tag = Tag::new(b'X', b'S');
/// Edit distance tag.
pub const EDIT_DISTANCE: Tag = Tag::new(b'N', b'M');
/// Free text comment tag.
pub const COMMENT: Tag = Tag::new(b'C', b'O');
/// Previous alignment tag written for contaminant reads.
pub const PREVIOUS_ALIGNMENT: Tag = Tag::new(b'P', b'A');
/// Program group tag.
pub const PROGRAM: Tag = Tag::new(b'P', b'G');
/// Adapter marker tag: 1-based read position at which adapter sequence starts.
pub const ADAPTER_START: Tag = Tag::new(b'X', b'T');

/// Error returned for a tag name that is not two characters of the SAM tag alphabet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid SAM tag '{0}': tags must be one letter followed by one letter or digit")]
pub struct InvalidTagError(pub String);

/// Parses a two character tag name.
#[must_use]
pub fn tag_from_str(name: &str) -> Option<Tag> {
    match name.as_bytes() {
        [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphanumeric() => Some(Tag::new(*a, *b)),
        _ => None,
    }
}

/// Formats a tag as its two character name.
#[must_use]
pub fn tag_to_string(tag: Tag) -> String {
    let bytes: [u8; 2] = tag.into();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// True for tags in the locally defined namespace (`X?`, `Y?`, `Z?`) or containing a
/// lowercase letter. These are only carried from an aligner's output when explicitly retained.
#[must_use]
pub fn is_reserved_tag(tag: Tag) -> bool {
    let [a, b]: [u8; 2] = tag.into();
    matches!(a, b'X' | b'Y' | b'Z') || a.is_ascii_lowercase() || b.is_ascii_lowercase()
}

/// Reverses a string or array tag value; other values are returned unchanged.
#[must_use]
pub fn reverse_buf_value(value: &BufValue) -> BufValue {
    fn reversed<T: Copy>(values: &[T]) -> Vec<T> {
        values.iter().rev().copied().collect()
    }

    match value {
        BufValue::String(s) => BufValue::String(BString::from(reversed(s.as_slice()))),
        BufValue::Array(array) => BufValue::Array(match array {
            Array::Int8(v) => Array::Int8(reversed(v)),
            Array::UInt8(v) => Array::UInt8(reversed(v)),
            Array::Int16(v) => Array::Int16(reversed(v)),
            Array::UInt16(v) => Array::UInt16(reversed(v)),
            Array::Int32(v) => Array::Int32(reversed(v)),
            Array::UInt32(v) => Array::UInt32(reversed(v)),
            Array::Float(v) => Array::Float(reversed(v)),
        }),
        _ => value.clone(),
    }
}

/// Reverse complements a string tag value; other values are returned unchanged.
#[must_use]
pub fn revcomp_buf_value(value: &BufValue) -> BufValue {
    match value {
        BufValue::String(s) => {
            let bases: Vec<u8> = s.iter().rev().map(|&b| complement_base(b)).collect();
            BufValue::String(BString::from(bases))
        }
        _ => value.clone(),
    }
}

/// Encodes an integer with the narrowest signed type that holds it.
#[must_use]
pub fn to_smallest_signed_int(value: i32) -> BufValue {
    if let Ok(v) = i8::try_from(value) {
        BufValue::Int8(v)
    } else if let Ok(v) = i16::try_from(value) {
        BufValue::Int16(v)
    } else {
        BufValue::Int32(value)
    }
}

/// Re-encodes an integer tag value with the narrowest signed type; `None` for non-integers
/// and for `u32` values above `i32::MAX`.
#[must_use]
pub fn buf_value_to_smallest_signed_int(value: &BufValue) -> Option<BufValue> {
    let n = buf_value_as_i64(value)?;
    i32::try_from(n).ok().map(to_smallest_signed_int)
}

/// Reads any integer tag value as an `i64`.
#[must_use]
pub fn buf_value_as_i64(value: &BufValue) -> Option<i64> {
    match value {
        BufValue::Int8(n) => Some(i64::from(*n)),
        BufValue::UInt8(n) => Some(i64::from(*n)),
        BufValue::Int16(n) => Some(i64::from(*n)),
        BufValue::UInt16(n) => Some(i64::from(*n)),
        BufValue::Int32(n) => Some(i64::from(*n)),
        BufValue::UInt32(n) => Some(i64::from(*n)),
        _ => None,
    }
}

/// Renders a scalar tag value as SAM text (no type prefix). Arrays render comma separated.
#[must_use]
pub fn buf_value_to_string(value: &BufValue) -> String {
    fn join<T: ToString>(values: &[T]) -> String {
        values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }

    match value {
        BufValue::Character(c) => char::from(*c).to_string(),
        BufValue::String(s) | BufValue::Hex(s) => s.to_string(),
        BufValue::Float(f) => f.to_string(),
        BufValue::Array(array) => match array {
            Array::Int8(v) => join(v),
            Array::UInt8(v) => join(v),
            Array::Int16(v) => join(v),
            Array::UInt16(v) => join(v),
            Array::Int32(v) => join(v),
            Array::UInt32(v) => join(v),
            Array::Float(v) => join(v),
        },
        other => buf_value_as_i64(other).map(|n| n.to_string()).unwrap_or_default(),
    }
}

/// The tags that survive an alignment merge and how they follow a strand flip.
///
/// `retain` names the tags of the original unaligned read to keep; `reverse` and `revcomp`
/// name the retained tags that are reversed or reverse complemented when the read is aligned
/// to the opposite strand. Tags listed in `reverse` or `revcomp` are also retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub retain: Vec<Tag>,
    pub reverse: Vec<Tag>,
    pub revcomp: Vec<Tag>,
}

impl TagInfo {
    /// Builds the tag sets from tag names, expanding [`CONSENSUS_TAG_SET`].
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidTagError`] for any name that is not a valid tag.
    pub fn new(
        retain: &[String],
        reverse: &[String],
        revcomp: &[String],
    ) -> Result<Self, InvalidTagError> {
        let reverse = parse_tag_list(reverse, &CONSENSUS_REVERSE_TAGS)?;
        let revcomp = parse_tag_list(revcomp, &CONSENSUS_REVCOMP_TAGS)?;

        let mut all_retained = parse_tag_list(retain, &[])?;
        for tag in reverse.iter().chain(revcomp.iter()) {
            if !all_retained.contains(tag) {
                all_retained.push(*tag);
            }
        }

        Ok(Self { retain: all_retained, reverse, revcomp })
    }

    /// True if nothing is retained from the unaligned read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retain.is_empty()
    }
}

fn parse_tag_list(names: &[String], consensus: &[&str]) -> Result<Vec<Tag>, InvalidTagError> {
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let expanded: Vec<&str> = if name == CONSENSUS_TAG_SET && !consensus.is_empty() {
            consensus.to_vec()
        } else {
            vec![name.as_str()]
        };
        for n in expanded {
            let tag = tag_from_str(n).ok_or_else(|| InvalidTagError(n.to_string()))?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[rstest]
    #[case("MC", Some(Tag::new(b'M', b'C')))]
    #[case("X0", Some(Tag::new(b'X', b'0')))]
    #[case("0X", None)]
    #[case("M", None)]
    #[case("MCA", None)]
    fn test_tag_from_str(#[case] name: &str, #[case] expected: Option<Tag>) {
        assert_eq!(tag_from_str(name), expected);
    }

    #[test]
    fn test_tag_to_string() {
        assert_eq!(tag_to_string(MATE_CIGAR), "MC");
        assert_eq!(tag_to_string(MATE_SCORE), "ms");
    }

    #[rstest]
    #[case("XS", true)]
    #[case("YT", true)]
    #[case("ZZ", true)]
    #[case("ms", true)]
    #[case("aD", true)]
    #[case("AS", false)]
    #[case("NM", false)]
    #[case("SA", false)]
    fn test_is_reserved_tag(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_reserved_tag(tag_from_str(name).unwrap()), expected);
    }

    #[test]
    fn test_reverse_buf_value() {
        assert_eq!(reverse_buf_value(&BufValue::from("ABCD")), BufValue::from("DCBA"));
        assert_eq!(
            reverse_buf_value(&BufValue::from(vec![1i16, 2, 3])),
            BufValue::from(vec![3i16, 2, 1])
        );
        assert_eq!(reverse_buf_value(&BufValue::Int8(5)), BufValue::Int8(5));
    }

    #[test]
    fn test_revcomp_buf_value() {
        assert_eq!(revcomp_buf_value(&BufValue::from("AACGTN")), BufValue::from("NACGTT"));
        assert_eq!(
            revcomp_buf_value(&BufValue::from(vec![1u8, 2])),
            BufValue::from(vec![1u8, 2])
        );
    }

    #[rstest]
    #[case(0, BufValue::Int8(0))]
    #[case(-128, BufValue::Int8(-128))]
    #[case(200, BufValue::Int16(200))]
    #[case(40_000, BufValue::Int32(40_000))]
    fn test_to_smallest_signed_int(#[case] value: i32, #[case] expected: BufValue) {
        assert_eq!(to_smallest_signed_int(value), expected);
    }

    #[test]
    fn test_buf_value_to_smallest_signed_int() {
        assert_eq!(buf_value_to_smallest_signed_int(&BufValue::UInt8(7)), Some(BufValue::Int8(7)));
        assert_eq!(
            buf_value_to_smallest_signed_int(&BufValue::UInt32(70_000)),
            Some(BufValue::Int32(70_000))
        );
        assert_eq!(buf_value_to_smallest_signed_int(&BufValue::UInt32(u32::MAX)), None);
        assert_eq!(buf_value_to_smallest_signed_int(&BufValue::from("7")), None);
    }

    #[test]
    fn test_buf_value_to_string() {
        assert_eq!(buf_value_to_string(&BufValue::UInt8(3)), "3");
        assert_eq!(buf_value_to_string(&BufValue::from("abc")), "abc");
        assert_eq!(buf_value_to_string(&BufValue::Character(b'Z')), "Z");
        assert_eq!(buf_value_to_string(&BufValue::from(vec![1i32, -2])), "1,-2");
    }

    #[test]
    fn test_tag_info_expands_consensus() {
        let info = TagInfo::new(
            &names(&["RX"]),
            &names(&[CONSENSUS_TAG_SET]),
            &names(&[CONSENSUS_TAG_SET]),
        )
        .unwrap();

        assert_eq!(info.reverse.len(), 5);
        assert_eq!(info.revcomp.len(), 3);
        assert_eq!(info.retain.len(), 1 + 5 + 3);
        assert!(info.retain.contains(&tag_from_str("aD").unwrap()));
    }

    #[test]
    fn test_tag_info_deduplicates() {
        let info = TagInfo::new(&names(&["RX", "RX", "OQ"]), &names(&["OQ"]), &[]).unwrap();
        assert_eq!(info.retain, vec![tag_from_str("RX").unwrap(), tag_from_str("OQ").unwrap()]);
    }

    #[test]
    fn test_tag_info_rejects_invalid() {
        let err = TagInfo::new(&names(&["RX", "BAD"]), &[], &[]).unwrap_err();
        assert_eq!(err, InvalidTagError("BAD".to_string()));
    }
}
