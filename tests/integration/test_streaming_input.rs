//! Streaming tests: aligned SAM on stdin and BAM on stdout, as in an aligner pipeline.

use noodles::bam;
use tempfile::TempDir;

use crate::helpers::*;

#[test]
fn test_merge_sam_from_stdin() {
    let dir = TempDir::new().unwrap();
    let unmapped = dir.path().join("unmapped.bam");
    let output = dir.path().join("merged.bam");
    let records: Vec<_> =
        unmapped_pair("q1", 100, "AAAA").into_iter().chain(unmapped_pair("q2", 100, "CCCC")).collect();
    create_unmapped_bam(&unmapped, &records);

    let aligned: Vec<_> = aligned_pair("q1", 500, "100M", 700, "100M")
        .into_iter()
        .chain(aligned_pair("q2", 900, "100M", 1100, "100M"))
        .collect();
    let sam = sam_bytes(&create_aligned_header(), &aligned);

    let result = run_fgmerge_with_stdin(
        &[
            "merge",
            "-u",
            unmapped.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--tags-to-retain",
            "RX",
        ],
        &sam,
    );
    assert_success(&result);

    let (_, merged) = read_bam(&output);
    assert_eq!(merged.len(), 4);
    assert_string_tag(&merged[2], "RX", "CCCC");
    assert_alignment(&merged[2], "100M", 900);
}

#[test]
fn test_merge_bam_to_stdout() {
    let dir = TempDir::new().unwrap();
    let unmapped = dir.path().join("unmapped.bam");
    let aligned = dir.path().join("aligned.sam");
    create_unmapped_bam(&unmapped, &unmapped_pair("q1", 100, "AAAA"));
    create_aligned_sam(&aligned, &aligned_pair("q1", 500, "100M", 700, "100M"));

    let result = run_fgmerge(&[
        "merge",
        "-u",
        unmapped.to_str().unwrap(),
        "-i",
        aligned.to_str().unwrap(),
        "-o",
        "-",
        "--threads",
        "2",
    ]);
    assert_success(&result);

    let mut reader = bam::io::Reader::new(&result.stdout[..]);
    let header = reader.read_header().unwrap();
    let records: Vec<_> = reader.record_bufs(&header).map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_mates(&records[0], &records[1]);
}
