//! Validation of command-line inputs.

use crate::errors::{MergeError, Result};
use std::fmt::Display;
use std::path::Path;

/// Fails if `path` does not exist.
///
/// # Errors
///
/// Returns [`MergeError::InvalidFileFormat`] naming the missing file.
///
/// ```
/// use fgmerge_lib::validation::validate_file_exists;
/// assert!(validate_file_exists("/nonexistent/unmapped.bam", "Unmapped BAM").is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        Ok(())
    } else {
        Err(MergeError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path.display().to_string(),
            reason: "File does not exist".to_string(),
        })
    }
}

/// Fails unless `value` is strictly positive.
///
/// # Errors
///
/// Returns [`MergeError::InvalidParameter`] when `value` is zero or negative.
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value > T::default() {
        Ok(())
    } else {
        Err(MergeError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("must be > 0, got {value}"),
        })
    }
}

/// Fails unless `level` is a valid BGZF compression level.
///
/// # Errors
///
/// Returns [`MergeError::InvalidParameter`] when `level` is above 12.
pub fn validate_compression_level(level: u32) -> Result<()> {
    if level <= 12 {
        Ok(())
    } else {
        Err(MergeError::InvalidParameter {
            parameter: "compression-level".to_string(),
            reason: format!("must be between 0 and 12, got {level}"),
        })
    }
}
