//! End-to-end CLI tests for the merge command.

use fgmerge_sam::builder::RecordBuilder;
use std::fs;
use tempfile::TempDir;

use crate::helpers::*;

struct Paths {
    _dir: TempDir,
    unmapped: String,
    aligned: String,
    output: String,
    metrics: String,
}

fn paths(aligned_name: &str) -> Paths {
    let dir = TempDir::new().unwrap();
    let path = |name: &str| dir.path().join(name).to_str().unwrap().to_string();
    Paths {
        unmapped: path("unmapped.bam"),
        aligned: path(aligned_name),
        output: path("merged.bam"),
        metrics: path("metrics.txt"),
        _dir: dir,
    }
}

fn run(paths: &Paths, extra: &[&str]) -> std::process::Output {
    let mut args = vec![
        "merge",
        "--unmapped",
        &paths.unmapped,
        "--input",
        &paths.aligned,
        "--output",
        &paths.output,
        "--metrics",
        &paths.metrics,
    ];
    args.extend_from_slice(extra);
    run_fgmerge(&args)
}

#[test]
fn test_merge_pairs_with_tags_and_overlap_clipping() {
    let p = paths("aligned.sam");
    let unmapped: Vec<_> =
        unmapped_pair("q1", 110, "AAAA").into_iter().chain(unmapped_pair("q2", 110, "CCCC")).collect();
    let aligned: Vec<_> = aligned_pair("q1", 100, "110M", 90, "110M")
        .into_iter()
        .chain(aligned_pair("q2", 1000, "110M", 1200, "110M"))
        .collect();
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped);
    create_aligned_sam(p.aligned.as_ref(), &aligned);

    let output = run(&p, &["--tags-to-retain", "RX"]);
    assert_success(&output);

    let (header, records) = read_bam(p.output.as_ref());
    assert_eq!(header.reference_sequences().len(), 1);
    assert!(!header.programs().as_ref().is_empty());
    assert_eq!(records.len(), 4);

    assert_string_tag(&records[0], "RX", "AAAA");
    assert_string_tag(&records[3], "RX", "CCCC");

    assert_alignment(&records[0], "100M10S", 100);
    assert_alignment(&records[1], "10S100M", 100);
    assert_mates(&records[0], &records[1]);
    assert_eq!(records[0].template_length(), 100);

    assert_alignment(&records[2], "110M", 1000);
    assert_alignment(&records[3], "110M", 1200);
    assert_mates(&records[2], &records[3]);

    let metrics = fs::read_to_string(&p.metrics).unwrap();
    let mut lines = metrics.lines();
    let columns: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let values: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let value = |name: &str| values[columns.iter().position(|c| *c == name).unwrap()];
    assert_eq!(value("templates"), "2");
    assert_eq!(value("reads_mapped"), "4");
    assert_eq!(value("pairs_overlap_clipped"), "1");
    assert_eq!(value("bases_overlap_clipped"), "20");
}

#[test]
fn test_merge_without_overlap_clipping() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped_pair("q1", 110, "AAAA"));
    create_aligned_sam(p.aligned.as_ref(), &aligned_pair("q1", 100, "110M", 90, "110M"));

    let output = run(&p, &["--clip-overlapping-reads", "false"]);
    assert_success(&output);

    let (_, records) = read_bam(p.output.as_ref());
    assert_alignment(&records[0], "110M", 100);
    assert_alignment(&records[1], "110M", 90);
    assert_no_tag(&records[0], "RX");
}

#[test]
fn test_merge_aligned_bam_input() {
    let p = paths("aligned.bam");
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped_pair("q1", 100, "GGTT"));
    create_aligned_bam(p.aligned.as_ref(), &aligned_pair("q1", 500, "100M", 700, "100M"));

    let output = run(&p, &["--tags-to-retain", "RX"]);
    assert_success(&output);

    let (_, records) = read_bam(p.output.as_ref());
    assert_eq!(records.len(), 2);
    assert_string_tag(&records[1], "RX", "GGTT");
    assert_eq!(records[0].template_length(), 300);
}

#[test]
fn test_merge_reverse_strand_tags_are_reverse_complemented() {
    let p = paths("aligned.sam");
    let mut unmapped = unmapped_pair("q1", 100, "AACG");
    unmapped[1] = RecordBuilder::new()
        .name("q1")
        .sequence(&read_bases(100))
        .first_segment(false)
        .unmapped(true)
        .tag("RX", "AACG")
        .tag("OQ", "ABCD")
        .build();
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped);
    create_aligned_sam(p.aligned.as_ref(), &aligned_pair("q1", 500, "100M", 700, "100M"));

    let output = run(&p, &["--tags-to-revcomp", "RX", "--tags-to-reverse", "OQ"]);
    assert_success(&output);

    let (_, records) = read_bam(p.output.as_ref());
    assert_string_tag(&records[0], "RX", "AACG");
    assert_string_tag(&records[1], "RX", "CGTT");
    assert_string_tag(&records[1], "OQ", "DCBA");
}

#[test]
fn test_merge_contaminant_move_to_tag() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &[unmapped_fragment("f1", 60, "AAAA")]);
    let aligned = RecordBuilder::mapped_read()
        .name("f1")
        .alignment_start(100)
        .cigar("20S20M20S")
        .mapping_quality(40)
        .build();
    create_aligned_sam(p.aligned.as_ref(), &[aligned]);

    let output = run(
        &p,
        &["--unmap-contaminant-reads", "--unmapping-strategy", "move-to-tag", "--tags-to-retain", "RX"],
    );
    assert_success(&output);

    let (_, records) = read_bam(p.output.as_ref());
    assert_eq!(records.len(), 1);
    assert!(records[0].flags().is_unmapped());
    assert!(records[0].reference_sequence_id().is_none());
    assert_string_tag(&records[0], "RX", "AAAA");
    assert_string_tag(&records[0], "CO", "Cross-species contamination");
    assert_string_tag(&records[0], "PA", "chr1,100,20S20M20S,40,;");
}

#[test]
fn test_merge_contaminant_copy_to_tag_keeps_alignment() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &[unmapped_fragment("f1", 60, "AAAA")]);
    let aligned = RecordBuilder::mapped_read()
        .name("f1")
        .alignment_start(100)
        .cigar("20S20M20S")
        .mapping_quality(40)
        .build();
    create_aligned_sam(p.aligned.as_ref(), &[aligned]);

    let output = run(&p, &["--unmap-contaminant-reads"]);
    assert_success(&output);

    let (_, records) = read_bam(p.output.as_ref());
    assert!(!records[0].flags().is_unmapped());
    assert_alignment(&records[0], "20S20M20S", 100);
    assert!(records[0].mapping_quality().is_none());
    assert_string_tag(&records[0], "PA", "chr1,100,20S20M20S,40,;");
}

#[test]
fn test_merge_contamination_check_is_off_by_default() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &[unmapped_fragment("f1", 60, "AAAA")]);
    let aligned =
        RecordBuilder::mapped_read().name("f1").alignment_start(100).cigar("20S20M20S").build();
    create_aligned_sam(p.aligned.as_ref(), &[aligned]);

    assert_success(&run(&p, &[]));

    let (_, records) = read_bam(p.output.as_ref());
    assert!(!records[0].flags().is_unmapped());
    assert_no_tag(&records[0], "PA");
    assert_no_tag(&records[0], "CO");
}

#[test]
fn test_merge_adapter_clipping() {
    let p = paths("aligned.sam");
    // adapter starts at the 41st base, as marked in the unmapped BAM
    let unmapped = RecordBuilder::new()
        .name("f1")
        .sequence(&read_bases(50))
        .unmapped(true)
        .tag("XT", 41i32)
        .build();
    create_unmapped_bam(p.unmapped.as_ref(), &[unmapped]);
    let aligned = RecordBuilder::mapped_read().name("f1").alignment_start(100).cigar("50M").build();
    create_aligned_sam(p.aligned.as_ref(), &[aligned]);

    assert_success(&run(&p, &[]));
    let (_, records) = read_bam(p.output.as_ref());
    assert_alignment(&records[0], "40M10S", 100);

    assert_success(&run(&p, &["--clip-adapters", "false"]));
    let (_, records) = read_bam(p.output.as_ref());
    assert_alignment(&records[0], "50M", 100);
}

#[test]
fn test_merge_drops_secondary_and_supplementary() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped_pair("q1", 100, "AAAA"));
    let mut aligned = aligned_pair("q1", 500, "100M", 700, "100M");
    aligned.push(
        RecordBuilder::mapped_read()
            .name("q1")
            .first_segment(true)
            .supplementary(true)
            .alignment_start(5000)
            .cigar("60S40M")
            .build(),
    );
    create_aligned_sam(p.aligned.as_ref(), &aligned);

    assert_success(&run(&p, &[]));

    let (_, records) = read_bam(p.output.as_ref());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.flags().is_supplementary()));

    let metrics = fs::read_to_string(&p.metrics).unwrap();
    assert!(metrics.lines().next().unwrap().contains("secondary_or_supplementary_skipped"));
}

#[test]
fn test_merge_missing_reads() {
    let p = paths("aligned.sam");
    let unmapped: Vec<_> = unmapped_pair("q1", 100, "AAAA")
        .into_iter()
        .chain(unmapped_pair("q2", 100, "CCCC"))
        .chain(unmapped_pair("q3", 100, "GGGG"))
        .collect();
    create_unmapped_bam(p.unmapped.as_ref(), &unmapped);
    create_aligned_sam(p.aligned.as_ref(), &aligned_pair("q2", 500, "100M", 700, "100M"));

    assert_success(&run(&p, &[]));
    let (_, records) = read_bam(p.output.as_ref());
    assert_eq!(records.len(), 6);
    assert!(records[0].flags().is_unmapped());
    assert!(!records[2].flags().is_unmapped());
    assert!(records[5].flags().is_unmapped());

    assert_success(&run(&p, &["--exclude-missing-reads"]));
    let (_, records) = read_bam(p.output.as_ref());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name().is_some_and(|n| n == "q2")));
}

#[test]
fn test_merge_program_group() {
    let p = paths("aligned.sam");
    create_unmapped_bam(p.unmapped.as_ref(), &[unmapped_fragment("f1", 50, "AAAA")]);
    let aligned = RecordBuilder::mapped_read().name("f1").alignment_start(100).cigar("50M").build();
    create_aligned_sam(p.aligned.as_ref(), &[aligned]);

    assert_success(&run(&p, &["--program-group", "bwa"]));
    let (_, records) = read_bam(p.output.as_ref());
    assert_string_tag(&records[0], "PG", "bwa");
}
