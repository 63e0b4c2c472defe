//! Error path integration tests: invalid options, missing files and mismatched inputs.

use tempfile::TempDir;

use crate::helpers::*;

fn write_inputs(dir: &TempDir) -> (String, String) {
    let unmapped = dir.path().join("unmapped.bam");
    let aligned = dir.path().join("aligned.sam");
    create_unmapped_bam(&unmapped, &unmapped_pair("q1", 100, "AAAA"));
    create_aligned_sam(&aligned, &aligned_pair("q1", 500, "100M", 700, "100M"));
    (unmapped.to_str().unwrap().to_string(), aligned.to_str().unwrap().to_string())
}

#[test]
fn test_missing_unmapped_bam() {
    let dir = TempDir::new().unwrap();
    let (_, aligned) = write_inputs(&dir);
    let output = dir.path().join("out.bam");

    let result = run_fgmerge(&[
        "merge",
        "-u",
        "/nonexistent/unmapped.bam",
        "-i",
        &aligned,
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Unmapped BAM"));
}

#[test]
fn test_missing_aligned_input() {
    let dir = TempDir::new().unwrap();
    let (unmapped, _) = write_inputs(&dir);
    let output = dir.path().join("out.bam");

    let result = run_fgmerge(&[
        "merge",
        "-u",
        &unmapped,
        "-i",
        "/nonexistent/aligned.sam",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
}

#[test]
fn test_invalid_options_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (unmapped, aligned) = write_inputs(&dir);
    let output = dir.path().join("out.bam");
    let output = output.to_str().unwrap();

    for extra in [
        vec!["--tags-to-retain", "TOOLONG"],
        vec!["--compression-level", "13"],
        vec!["--unmap-contaminant-reads", "--min-unclipped-bases", "0"],
        vec!["--unmapping-strategy", "sideways"],
    ] {
        let mut args = vec!["merge", "-u", &unmapped, "-i", &aligned, "-o", output];
        args.extend(extra.iter().copied());
        let result = run_fgmerge(&args);
        assert!(!result.status.success(), "expected failure for {extra:?}");
    }
}

#[test]
fn test_aligned_read_missing_from_unmapped_bam() {
    let dir = TempDir::new().unwrap();
    let unmapped = dir.path().join("unmapped.bam");
    let aligned = dir.path().join("aligned.sam");
    let output = dir.path().join("out.bam");
    create_unmapped_bam(&unmapped, &unmapped_pair("q1", 100, "AAAA"));
    let records: Vec<_> = aligned_pair("q1", 500, "100M", 700, "100M")
        .into_iter()
        .chain(aligned_pair("zz", 900, "100M", 1100, "100M"))
        .collect();
    create_aligned_sam(&aligned, &records);

    let result = run_fgmerge(&[
        "merge",
        "-u",
        unmapped.to_str().unwrap(),
        "-i",
        aligned.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("zz"));
}

#[test]
fn test_ungrouped_unmapped_records() {
    let dir = TempDir::new().unwrap();
    let unmapped = dir.path().join("unmapped.bam");
    let aligned = dir.path().join("aligned.sam");
    let output = dir.path().join("out.bam");
    // the same pair twice in a row reads as one template with two R1s
    let records: Vec<_> =
        unmapped_pair("q1", 100, "AAAA").into_iter().chain(unmapped_pair("q1", 100, "AAAA")).collect();
    create_unmapped_bam(&unmapped, &records);
    create_aligned_sam(&aligned, &aligned_pair("q1", 500, "100M", 700, "100M"));

    let result = run_fgmerge(&[
        "merge",
        "-u",
        unmapped.to_str().unwrap(),
        "-i",
        aligned.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
}
