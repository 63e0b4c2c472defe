//! Utilities for writing test inputs and reading merged output.

#![allow(dead_code)]

use fgmerge_sam::builder::{RecordBuilder, header_with_references};
use noodles::bam;
use noodles::sam;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::fs;
use std::path::Path;

/// Length of the single reference sequence used by the aligned inputs.
pub const REFERENCE_LENGTH: usize = 10_000;

/// Header for aligned inputs: one reference, `chr1`.
pub fn create_aligned_header() -> Header {
    header_with_references(&[("chr1", REFERENCE_LENGTH)])
}

/// Writes unmapped records to a BAM with an otherwise empty header.
pub fn create_unmapped_bam(path: &Path, records: &[RecordBuf]) {
    let header = Header::default();
    let mut writer =
        bam::io::Writer::new(fs::File::create(path).expect("Failed to create unmapped BAM"));
    writer.write_header(&header).expect("Failed to write header");
    for record in records {
        writer.write_alignment_record(&header, record).expect("Failed to write record");
    }
    writer.finish(&header).expect("Failed to finish BAM");
}

/// Serializes a header and records as SAM text.
pub fn sam_bytes(header: &Header, records: &[RecordBuf]) -> Vec<u8> {
    let mut writer = sam::io::Writer::new(Vec::new());
    writer.write_header(header).expect("Failed to write header");
    for record in records {
        writer.write_alignment_record(header, record).expect("Failed to write record");
    }
    writer.into_inner()
}

/// Writes aligned records to a SAM file.
pub fn create_aligned_sam(path: &Path, records: &[RecordBuf]) {
    fs::write(path, sam_bytes(&create_aligned_header(), records)).expect("Failed to write SAM");
}

/// Writes aligned records to a BAM file.
pub fn create_aligned_bam(path: &Path, records: &[RecordBuf]) {
    let header = create_aligned_header();
    let mut writer =
        bam::io::Writer::new(fs::File::create(path).expect("Failed to create aligned BAM"));
    writer.write_header(&header).expect("Failed to write header");
    for record in records {
        writer.write_alignment_record(&header, record).expect("Failed to write record");
    }
    writer.finish(&header).expect("Failed to finish BAM");
}

/// Reads every record of a BAM file.
pub fn read_bam(path: &Path) -> (Header, Vec<RecordBuf>) {
    let mut reader = bam::io::Reader::new(fs::File::open(path).expect("Failed to open BAM"));
    let header = reader.read_header().expect("Failed to read header");
    let records = reader.record_bufs(&header).map(|r| r.expect("Failed to read record")).collect();
    (header, records)
}

/// Deterministic read bases of the given length.
pub fn read_bases(len: usize) -> String {
    "ACGTTGCAAC".chars().cycle().take(len).collect()
}

/// An unmapped read pair carrying an `RX` UMI.
pub fn unmapped_pair(name: &str, len: usize, umi: &str) -> Vec<RecordBuf> {
    [true, false]
        .into_iter()
        .map(|first| {
            RecordBuilder::new()
                .name(name)
                .sequence(&read_bases(len))
                .first_segment(first)
                .unmapped(true)
                .tag("RX", umi)
                .build()
        })
        .collect()
}

/// An unmapped fragment read carrying an `RX` UMI.
pub fn unmapped_fragment(name: &str, len: usize, umi: &str) -> RecordBuf {
    RecordBuilder::new().name(name).sequence(&read_bases(len)).unmapped(true).tag("RX", umi).build()
}

/// An aligned pair in forward/reverse orientation.
pub fn aligned_pair(name: &str, start1: usize, cigar1: &str, start2: usize, cigar2: &str) -> Vec<RecordBuf> {
    vec![
        RecordBuilder::mapped_read()
            .name(name)
            .first_segment(true)
            .alignment_start(start1)
            .cigar(cigar1)
            .tag("AS", 100i32)
            .build(),
        RecordBuilder::mapped_read()
            .name(name)
            .first_segment(false)
            .alignment_start(start2)
            .cigar(cigar2)
            .reverse_complement(true)
            .tag("AS", 90i32)
            .build(),
    ]
}
