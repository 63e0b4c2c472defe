//! CLI commands for `fgmerge`.
//!
//! - [`merge`] - merge an aligner's output back onto the unmapped reads

pub mod command;
pub mod common;
pub mod merge;
