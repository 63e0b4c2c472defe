#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::struct_excessive_bools,
    clippy::uninlined_format_args
)]

//! # fgmerge - merging aligner output back onto unmapped reads
//!
//! The alignment primitives live in the `fgmerge-sam` crate; this library wires them into a
//! streaming merge of an unmapped BAM with an aligner's output.
//!
//! - **[`merge`]** - per-template merge driver and contamination check
//! - **[`template`]** - grouping of queryname-grouped records into templates
//! - **[`header`]** - output header construction and `@PG` chaining
//! - **[`bam_io`]** - SAM/BAM readers and writers
//! - **[`metrics`]** - merge metrics and TSV output
//! - **[`errors`]**, **[`validation`]**, **[`logging`]**, **[`progress`]** - supporting utilities
//!
//! ```
//! use fgmerge_lib::merge::{MergeOptions, Merger};
//! use fgmerge_lib::template::Template;
//! use fgmerge_sam::builder::{RecordBuilder, header_with_references};
//!
//! let header = header_with_references(&[("chr1", 1000)]);
//! let unmapped = Template::from_records(vec![
//!     RecordBuilder::new().name("q1").sequence("ACGTACGTAC").unmapped(true).build(),
//! ])?;
//! let aligned = Template::from_records(vec![
//!     RecordBuilder::mapped_read().name("q1").cigar("10M").alignment_start(100).build(),
//! ])?;
//!
//! let mut merger = Merger::new(MergeOptions::default(), header);
//! let merged = merger.merge_template(unmapped, &aligned)?;
//! assert_eq!(merged[0].alignment_start().map(usize::from), Some(100));
//! # Ok::<(), fgmerge_lib::errors::MergeError>(())
//! ```

pub mod bam_io;
pub mod errors;
pub mod header;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod progress;
pub mod template;
pub mod validation;
