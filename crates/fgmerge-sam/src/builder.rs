//! Fluent builders for test records and headers.
//!
//! ```rust
//! use fgmerge_sam::builder::RecordBuilder;
//!
//! let unaligned = RecordBuilder::new()
//!     .name("q1")
//!     .sequence("ACGTACGT")
//!     .unmapped(true)
//!     .tag("RX", "ACGT")
//!     .build();
//! assert!(unaligned.cigar().as_ref().is_empty());
//!
//! let aligned = RecordBuilder::mapped_read()
//!     .name("q1")
//!     .cigar("2S6M")
//!     .alignment_start(100)
//!     .build();
//! assert_eq!(aligned.sequence().len(), 8);
//! ```

use std::num::NonZeroUsize;

use bstr::BString;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{Cigar, QualityScores, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::{ReadGroup, ReferenceSequence};

use crate::cigar::{parse_cigar, read_length};

pub const DEFAULT_BASE_QUALITY: u8 = 30;
pub const DEFAULT_MAPQ: u8 = 60;
pub const DEFAULT_READ_GROUP_ID: &str = "A";

/// Builds a header with the given reference sequences and one read group.
///
/// # Panics
///
/// Panics if a reference length is zero.
#[must_use]
pub fn header_with_references(references: &[(&str, usize)]) -> Header {
    let mut builder = Header::builder();
    for (name, length) in references {
        let length = NonZeroUsize::new(*length).expect("reference length must be non-zero");
        builder = builder.add_reference_sequence(BString::from(*name), Map::<ReferenceSequence>::new(length));
    }
    builder.add_read_group(BString::from(DEFAULT_READ_GROUP_ID), Map::<ReadGroup>::default()).build()
}

/// Builder for individual records.
///
/// If only a CIGAR is given a sequence of matching length is generated; if only a sequence is
/// given a mapped record gets an all-match CIGAR. Unmapped records never get a generated CIGAR.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    name: Option<Vec<u8>>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    mapping_quality: Option<u8>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
    tags: Vec<(Tag, BufValue)>,
    mate_reference_sequence_id: Option<usize>,
    mate_alignment_start: Option<usize>,
    template_length: Option<i32>,
}

impl RecordBuilder {
    /// Creates a builder for a record with no alignment and mapping quality 60.
    #[must_use]
    pub fn new() -> Self {
        Self { mapping_quality: Some(DEFAULT_MAPQ), ..Self::default() }
    }

    /// Creates a builder for a record mapped to reference 0.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self { reference_sequence_id: Some(0), ..Self::new() }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    /// Sets the bases; qualities default to Q30.
    #[must_use]
    pub fn sequence(mut self, bases: &str) -> Self {
        self.sequence = bases.as_bytes().to_vec();
        self
    }

    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.qualities = quals.to_vec();
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn paired(mut self, paired: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, paired);
        self
    }

    /// Marks the record as R1 (`true`) or R2 (`false`) of a pair.
    #[must_use]
    pub fn first_segment(mut self, is_first: bool) -> Self {
        self.flags.insert(Flags::SEGMENTED);
        self.flags.set(Flags::FIRST_SEGMENT, is_first);
        self.flags.set(Flags::LAST_SEGMENT, !is_first);
        self
    }

    #[must_use]
    pub fn properly_paired(mut self, properly_paired: bool) -> Self {
        if properly_paired {
            self.flags.insert(Flags::SEGMENTED);
        }
        self.flags.set(Flags::PROPERLY_SEGMENTED, properly_paired);
        self
    }

    /// Sets the unmapped flag; an unmapped record has no reference.
    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        if unmapped {
            self.reference_sequence_id = None;
        }
        self
    }

    #[must_use]
    pub fn reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::REVERSE_COMPLEMENTED, reverse);
        self
    }

    #[must_use]
    pub fn secondary(mut self, secondary: bool) -> Self {
        self.flags.set(Flags::SECONDARY, secondary);
        self
    }

    #[must_use]
    pub fn supplementary(mut self, supplementary: bool) -> Self {
        self.flags.set(Flags::SUPPLEMENTARY, supplementary);
        self
    }

    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the 1-based alignment start.
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    /// Sets the mapping quality; 255 means unavailable.
    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    #[must_use]
    pub fn mate_reference_sequence_id(mut self, id: usize) -> Self {
        self.mate_reference_sequence_id = Some(id);
        self
    }

    #[must_use]
    pub fn mate_alignment_start(mut self, pos: usize) -> Self {
        self.mate_alignment_start = Some(pos);
        self
    }

    #[must_use]
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = Some(tlen);
        self
    }

    #[must_use]
    pub fn mate_reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::MATE_REVERSE_COMPLEMENTED, reverse);
        self
    }

    #[must_use]
    pub fn mate_unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::MATE_UNMAPPED, unmapped);
        self
    }

    /// Adds a tag; names that are not two characters are ignored.
    #[must_use]
    pub fn tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        if let [a, b] = tag.as_bytes() {
            self.tags.push((Tag::new(*a, *b), value.into()));
        }
        self
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics on an invalid CIGAR or a zero position.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        if let Some(name) = self.name {
            *record.name_mut() = Some(name.into());
        }
        *record.flags_mut() = self.flags;
        *record.reference_sequence_id_mut() = self.reference_sequence_id;
        *record.alignment_start_mut() =
            self.alignment_start.map(|pos| Position::new(pos).expect("alignment start must be >= 1"));
        *record.mate_reference_sequence_id_mut() = self.mate_reference_sequence_id;
        *record.mate_alignment_start_mut() = self
            .mate_alignment_start
            .map(|pos| Position::new(pos).expect("mate alignment start must be >= 1"));
        *record.template_length_mut() = self.template_length.unwrap_or(0);
        *record.mapping_quality_mut() = self.mapping_quality.and_then(MappingQuality::new);

        let unmapped = self.flags.is_unmapped();
        let (ops, bases) = match (self.cigar, self.sequence.is_empty()) {
            (Some(cigar), true) => {
                let ops = parse_cigar(&cigar).expect("invalid CIGAR");
                let bases = b"ACGT".iter().copied().cycle().take(read_length(&ops)).collect();
                (ops, bases)
            }
            (Some(cigar), false) => (parse_cigar(&cigar).expect("invalid CIGAR"), self.sequence),
            (None, false) if !unmapped => {
                let ops = parse_cigar(&format!("{}M", self.sequence.len())).expect("invalid CIGAR");
                (ops, self.sequence)
            }
            (None, _) => (Vec::new(), self.sequence),
        };

        let qualities = if self.qualities.is_empty() {
            vec![DEFAULT_BASE_QUALITY; bases.len()]
        } else {
            self.qualities
        };

        *record.cigar_mut() = Cigar::from(ops);
        *record.sequence_mut() = Sequence::from(bases);
        *record.quality_scores_mut() = QualityScores::from(qualities);

        let data = record.data_mut();
        for (tag, value) in self.tags {
            data.insert(tag, value);
        }

        record
    }
}
