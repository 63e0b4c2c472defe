//! `merge`: transfer an aligner's output back onto the unmapped reads.
//!
//! Reads an unmapped BAM (the original reads with all their tags) and the aligner's SAM/BAM
//! output, both grouped by read name in the same order, and writes a BAM in which every
//! unmapped read carries the alignment the aligner produced for it.
//!
//! # Workflow
//!
//! 1. Read templates from both inputs on background threads.
//! 2. For each unmapped template, find the aligned template with the same name:
//!    - transfer each primary alignment onto the original read, keeping only retained tags,
//!    - flag or unmap reads whose alignment looks like cross-species contamination,
//!    - recompute mate information and clip the overlapping portion of pairs.
//! 3. Unmapped templates with no aligned counterpart are written unchanged, or dropped with
//!    `--exclude-missing-reads`.
//! 4. An aligned template left over once the unmapped input is exhausted is an error.

use crate::commands::command::Command;
use crate::commands::common::{CompressionOptions, ThreadingOptions};
use anyhow::{Context, Result, bail};
use clap::Parser;
use fgmerge_lib::bam_io::{
    create_bam_reader, create_bam_writer, finish_bam_writer, is_stdio_path, open_alignment_reader,
};
use fgmerge_lib::header::{add_pg_record, build_output_header};
use fgmerge_lib::logging::{OperationTimer, log_merge_summary};
use fgmerge_lib::merge::{ContaminationCheck, DEFAULT_MIN_UNCLIPPED_BASES, MergeOptions, Merger};
use fgmerge_lib::metrics::write_metrics;
use fgmerge_lib::progress::ProgressTracker;
use fgmerge_lib::template::{Template, TemplateIterator};
use fgmerge_lib::validation::{validate_file_exists, validate_positive};
use fgmerge_sam::tags::tag_to_string;
use fgmerge_sam::{TagInfo, TransferOptions, UnmappingStrategy};
use log::info;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use std::path::PathBuf;
use std::sync::mpsc::sync_channel;

/// Command-line arguments for `merge`.
#[derive(Parser, Debug)]
#[command(
    name = "merge",
    author,
    version,
    about = "\x1b[38;5;72m[ALIGNMENT]\x1b[0m      \x1b[36mMerge aligned reads back onto an unmapped BAM\x1b[0m",
    long_about = r#"
Merges an aligner's output back onto the original unmapped reads.

Each primary alignment is transferred onto the matching read from the unmapped BAM: position,
CIGAR, mapping quality, strand and mate fields come from the aligner; the read's bases,
qualities and the tags named in --tags-to-retain come from the unmapped BAM. Alignment tags
such as AS, NM, MD and SA are carried over from the aligner. Secondary and supplementary
alignments are not carried over.

Both inputs must be grouped by read name, with the same read names in the same order.

## Contamination

With --unmap-contaminant-reads, a read whose alignment has fewer than --min-unclipped-bases
non-clipped bases (and is clipped at both ends, unless --filter-single-end-clips) is treated as
cross-species contamination; for pairs, every mapped end must meet that test. Contaminant reads
get "Cross-species contamination" in their CO tag, the discarded alignment in their PA tag, and
are then handled by --unmapping-strategy:
- do-not-change: keep the alignment, with mapping quality unavailable
- copy-to-tag:   as do-not-change, and mate information is recomputed
- move-to-tag:   unmap the read; the alignment survives only in PA

## Clipping

Reads are soft clipped at the 3' end where the XT tag marks adapter sequence, where they
overhang the end of the reference, and (with --clip-overlapping-reads) where the two reads of a
pair extend past each other.

Example:

  bwa mem -p ref.fa reads.fq | fgmerge merge -u unmapped.bam -o merged.bam --tags-to-retain RX
"#
)]
#[command(verbatim_doc_comment)]
pub struct Merge {
    /// Unmapped BAM file with the original reads and tags
    #[arg(short = 'u', long)]
    pub unmapped: PathBuf,

    /// Aligned SAM or BAM file (or `-` for SAM on stdin)
    #[arg(short = 'i', long, default_value = "-")]
    pub input: PathBuf,

    /// Output BAM file (or `-` for stdout)
    #[arg(short = 'o', long, default_value = "-")]
    pub output: PathBuf,

    /// Optional output file for merge metrics
    #[arg(short = 'm', long)]
    pub metrics: Option<PathBuf>,

    /// Tags of the unmapped reads to keep; `Consensus` names the consensus per-base tags
    #[arg(long, value_delimiter = ',')]
    pub tags_to_retain: Vec<String>,

    /// Retained tags to reverse when a read is stored on the other strand
    #[arg(long, value_delimiter = ',')]
    pub tags_to_reverse: Vec<String>,

    /// Retained tags to reverse complement when a read is stored on the other strand
    #[arg(long, value_delimiter = ',')]
    pub tags_to_revcomp: Vec<String>,

    /// Treat heavily clipped alignments as cross-species contamination
    #[arg(long, default_value = "false")]
    pub unmap_contaminant_reads: bool,

    /// Minimum number of non-clipped bases for an alignment not to be a contaminant
    #[arg(long, default_value_t = DEFAULT_MIN_UNCLIPPED_BASES)]
    pub min_unclipped_bases: usize,

    /// Treat alignments clipped at only one end as contaminants too
    #[arg(long, default_value = "false")]
    pub filter_single_end_clips: bool,

    /// How contaminant reads are handled
    #[arg(long, value_enum, default_value_t = UnmappingStrategy::CopyToTag)]
    pub unmapping_strategy: UnmappingStrategy,

    /// Soft clip the portion of a pair where each read extends past its mate
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    pub clip_overlapping_reads: bool,

    /// Soft clip adapter sequence marked by the XT tag
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    pub clip_adapters: bool,

    /// Value for the PG tag of every merged read
    #[arg(long)]
    pub program_group: Option<String>,

    /// Drop reads from the unmapped BAM that are not present in the aligned input
    #[arg(long, default_value = "false")]
    pub exclude_missing_reads: bool,

    #[command(flatten)]
    pub compression: CompressionOptions,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Merge {
    fn merge_options(&self, tag_info: &TagInfo) -> MergeOptions {
        let mut transfer = TransferOptions::new(tag_info, self.unmapping_strategy);
        transfer.program_group.clone_from(&self.program_group);

        MergeOptions {
            transfer,
            contamination: self.unmap_contaminant_reads.then_some(ContaminationCheck {
                min_unclipped_bases: self.min_unclipped_bases,
                filter_single_end_clips: self.filter_single_end_clips,
            }),
            clip_overlapping_reads: self.clip_overlapping_reads,
            clip_adapters: self.clip_adapters,
            exclude_missing_reads: self.exclude_missing_reads,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_file_exists(&self.unmapped, "Unmapped BAM")?;
        if !is_stdio_path(&self.input) {
            validate_file_exists(&self.input, "Aligned SAM/BAM")?;
        }
        if self.unmap_contaminant_reads {
            validate_positive(self.min_unclipped_bases, "min-unclipped-bases")?;
        }
        validate_positive(self.threading.buffer, "buffer")?;
        self.compression.validate()
    }
}

/// Merges the two template streams, writing every output record. Returns the number of
/// records written.
fn merge_templates<U, A, W>(
    merger: &mut Merger,
    unmapped: U,
    mut aligned: A,
    header: &Header,
    writer: &mut W,
) -> Result<u64>
where
    U: Iterator<Item = Result<Template>>,
    A: Iterator<Item = Result<Template>>,
    W: AlignmentWrite,
{
    let progress = ProgressTracker::new("Merged records");
    let mut aligned_peek: Option<Template> = None;

    for unmapped_template in unmapped {
        let unmapped_template = unmapped_template?;
        if aligned_peek.is_none() {
            aligned_peek = aligned.next().transpose()?;
        }

        let records = match aligned_peek.take() {
            Some(aligned_template) if aligned_template.name == unmapped_template.name => {
                merger.merge_template(unmapped_template, &aligned_template)?
            }
            other => {
                aligned_peek = other;
                merger.pass_through(unmapped_template)
            }
        };

        for record in &records {
            writer.write_alignment_record(header, record)?;
        }
        progress.log_if_needed(records.len() as u64);
    }
    progress.log_final();

    let leftover = match aligned_peek {
        Some(template) => Some(template),
        None => aligned.next().transpose()?,
    };
    if let Some(template) = leftover {
        bail!(
            "Processed all unmapped reads but aligned reads remain, starting with '{}'. Both \
             inputs must contain the same read names in the same order, with records of the same \
             name grouped together.",
            template.name_str()
        );
    }

    Ok(progress.count())
}

/// Runs `iter` on a background thread, handing its items over a bounded channel.
fn read_ahead<T, I>(iter: I, buffer: usize) -> impl Iterator<Item = T>
where
    T: Send + 'static,
    I: Iterator<Item = T> + Send + 'static,
{
    let (tx, rx) = sync_channel::<T>(buffer);
    std::thread::spawn(move || {
        for item in iter {
            if tx.send(item).is_err() {
                break;
            }
        }
    });
    std::iter::from_fn(move || rx.recv().ok())
}

impl Command for Merge {
    fn execute(&self, command_line: &str) -> Result<()> {
        info!("Starting merge");
        let timer = OperationTimer::new("Merging alignments");

        self.validate()?;

        let tag_info = TagInfo::new(&self.tags_to_retain, &self.tags_to_reverse, &self.tags_to_revcomp)?;
        for (label, tags) in [
            ("retained", &tag_info.retain),
            ("reversed", &tag_info.reverse),
            ("reverse complemented", &tag_info.revcomp),
        ] {
            if !tags.is_empty() {
                let names: Vec<String> = tags.iter().map(|t| tag_to_string(*t)).collect();
                info!("Tags {label}: {}", names.join(","));
            }
        }
        if self.unmap_contaminant_reads {
            info!(
                "Contaminant reads (< {} unclipped bases) handled with strategy {}",
                self.min_unclipped_bases, self.unmapping_strategy
            );
        }

        let threads = self.threading.threads;
        let (unmapped_reader, unmapped_header) = create_bam_reader(&self.unmapped, threads)?;
        let (aligned_reader, aligned_header) = open_alignment_reader(&self.input, threads)?;

        let output_header = build_output_header(&unmapped_header, &aligned_header);
        let output_header =
            add_pg_record(output_header, crate::version::VERSION.as_str(), command_line)?;

        let mut unmapped_reader = unmapped_reader;
        let unmapped_records = std::iter::from_fn(move || {
            let mut record = noodles::sam::alignment::RecordBuf::default();
            match unmapped_reader.read_record_buf(&unmapped_header, &mut record) {
                Ok(0) => None,
                Ok(_) => Some(Ok(record)),
                Err(e) => Some(Err(anyhow::Error::from(e).context("Failed to read unmapped record"))),
            }
        });
        let unmapped_templates = read_ahead(TemplateIterator::new(unmapped_records), self.threading.buffer);
        let aligned_templates = read_ahead(
            TemplateIterator::new(aligned_reader.into_records(aligned_header)),
            self.threading.buffer,
        );

        let mut writer =
            create_bam_writer(&self.output, &output_header, threads, self.compression.compression_level)?;
        let mut merger = Merger::new(self.merge_options(&tag_info), output_header.clone());

        let result = merge_templates(
            &mut merger,
            unmapped_templates,
            aligned_templates,
            &output_header,
            &mut writer,
        );
        finish_bam_writer(writer)?;
        let total_records = result?;

        let metrics = merger.into_metrics();
        log_merge_summary(&metrics);
        if let Some(path) = &self.metrics {
            write_metrics(path, std::slice::from_ref(&metrics))
                .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        }

        info!("merge completed successfully");
        timer.log_completion(total_records);
        Ok(())
    }
}
