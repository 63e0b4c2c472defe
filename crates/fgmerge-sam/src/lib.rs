//! Alignment merge primitives on `noodles` records.
//!
//! - [`transfer`]: moves an aligner's result onto the original unaligned read and handles reads
//!   judged to be cross-species contaminants.
//! - [`clipper`]: soft clipping, including clipping of overlapping read pairs.
//! - [`mate`]: mate information fix-up for read pairs.
//! - [`cigar`] and [`tags`]: CIGAR and auxiliary tag helpers.
//! - [`builder`]: record builders for tests.

pub mod builder;
pub mod cigar;
pub mod clipper;
pub mod dna;
pub mod mate;
pub mod tags;
pub mod transfer;

pub use clipper::clip_overlap;
pub use mate::set_mate_info;
pub use tags::TagInfo;
pub use transfer::{TransferOptions, TransferOutcome, UnmappingStrategy, transfer_alignment};
