//! Assertion helpers for merged records.

#![allow(dead_code)]

use fgmerge_sam::cigar::cigar_to_string;
use fgmerge_sam::tags::tag_from_str;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

/// Asserts that a record has a string tag with the expected value.
///
/// # Panics
///
/// Panics if the tag is missing, is not a string, or differs.
pub fn assert_string_tag(record: &RecordBuf, tag: &str, expected: &str) {
    let value = record
        .data()
        .get(&tag_from_str(tag).expect("valid tag"))
        .unwrap_or_else(|| panic!("Record {:?} should have {tag} tag", record.name()));

    match value {
        Value::String(s) => {
            let s_bytes: &[u8] = s.as_ref();
            assert_eq!(s_bytes, expected.as_bytes(), "{tag} mismatch for record {:?}", record.name());
        }
        _ => panic!("{tag} tag should be a string"),
    }
}

/// Asserts that a record lacks a tag.
pub fn assert_no_tag(record: &RecordBuf, tag: &str) {
    assert!(
        record.data().get(&tag_from_str(tag).expect("valid tag")).is_none(),
        "Record {:?} should not have {tag} tag",
        record.name()
    );
}

/// Asserts a record's CIGAR and 1-based alignment start.
pub fn assert_alignment(record: &RecordBuf, cigar: &str, start: usize) {
    assert_eq!(cigar_to_string(record.cigar().as_ref()), cigar, "CIGAR mismatch for {:?}", record.name());
    assert_eq!(
        record.alignment_start().map(usize::from),
        Some(start),
        "start mismatch for {:?}",
        record.name()
    );
}

/// Asserts that two records point at each other as mates.
pub fn assert_mates(r1: &RecordBuf, r2: &RecordBuf) {
    assert_eq!(r1.mate_alignment_start(), r2.alignment_start());
    assert_eq!(r2.mate_alignment_start(), r1.alignment_start());
    assert_eq!(r1.template_length(), -r2.template_length());
    assert_string_tag(r1, "MC", &cigar_to_string(r2.cigar().as_ref()));
    assert_string_tag(r2, "MC", &cigar_to_string(r1.cigar().as_ref()));
}
