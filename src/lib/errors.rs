//! Error types for merge operations.

use fgmerge_sam::cigar::CigarParseError;
use fgmerge_sam::tags::InvalidTagError;
use thiserror::Error;

/// Result type alias for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;

/// Error type for merge operations
#[derive(Error, Debug)]
pub enum MergeError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A tag name could not be parsed
    #[error(transparent)]
    InvalidTag(#[from] InvalidTagError),

    /// A CIGAR string could not be parsed
    #[error(transparent)]
    InvalidCigar(#[from] CigarParseError),

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "SAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// The records of a template are inconsistent
    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate {
        /// Read name of the template
        name: String,
        /// Explanation of the problem
        reason: String,
    },

    /// The unmapped and aligned inputs are not in the same order
    #[error(
        "Unmapped template '{unmapped}' does not match aligned template '{aligned}'. Both inputs \
         must contain the same read names in the same order, with records of the same name grouped."
    )]
    TemplateMismatch {
        /// Name of the template from the unmapped input
        unmapped: String,
        /// Name of the template from the aligned input
        aligned: String,
    },

    /// Required reference sequence not found
    #[error("Reference sequence '{ref_name}' not found in header")]
    ReferenceNotFound {
        /// The reference sequence name
        ref_name: String,
    },
}
