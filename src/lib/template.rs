//! Grouping records into templates by read name.
//!
//! A [`Template`] holds every record that shares one query name: the primary R1 and R2 of a
//! pair (or a single fragment read) plus any secondary and supplementary alignments.
//! [`TemplateIterator`] turns a queryname-grouped record stream into a stream of templates.

use crate::errors::{MergeError, Result};
use noodles::sam::alignment::record_buf::RecordBuf;

/// All records sharing one query name.
#[derive(Debug, Clone, Default)]
pub struct Template {
    /// The query name shared by all records
    pub name: Vec<u8>,
    /// The records, in input order
    pub records: Vec<RecordBuf>,
    r1: Option<usize>,
    r2: Option<usize>,
}

fn is_primary(record: &RecordBuf) -> bool {
    let flags = record.flags();
    !flags.is_secondary() && !flags.is_supplementary()
}

/// True for fragment reads and for the first segment of a pair.
fn is_r1(record: &RecordBuf) -> bool {
    let flags = record.flags();
    !flags.is_segmented() || flags.is_first_segment()
}

fn record_name(record: &RecordBuf) -> Vec<u8> {
    record.name().map(|n| <_ as AsRef<[u8]>>::as_ref(n).to_vec()).unwrap_or_default()
}

impl Template {
    /// Builds a template from records that share a query name.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidTemplate`] if there are no records, if the names differ, or
    /// if there is more than one primary R1 or R2.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RecordBuf>,
    {
        let records: Vec<RecordBuf> = records.into_iter().collect();
        let Some(first) = records.first() else {
            return Err(MergeError::InvalidTemplate {
                name: String::new(),
                reason: "a template needs at least one record".to_string(),
            });
        };
        let name = record_name(first);
        let invalid = |reason: String| MergeError::InvalidTemplate {
            name: String::from_utf8_lossy(&name).into_owned(),
            reason,
        };

        let mut r1 = None;
        let mut r2 = None;
        for (i, record) in records.iter().enumerate() {
            if record_name(record) != name {
                return Err(invalid(format!(
                    "record has a different name: {}",
                    String::from_utf8_lossy(&record_name(record))
                )));
            }
            if !is_primary(record) {
                continue;
            }
            let slot = if is_r1(record) { &mut r1 } else { &mut r2 };
            if slot.replace(i).is_some() {
                let which = if is_r1(record) { "R1" } else { "R2" };
                return Err(invalid(format!("found multiple primary {which} records")));
            }
        }

        Ok(Self { name, records, r1, r2 })
    }

    /// The query name as a (lossy) string.
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// The primary R1, or the primary fragment read of an unpaired template.
    #[must_use]
    pub fn r1(&self) -> Option<&RecordBuf> {
        self.r1.and_then(|i| self.records.get(i))
    }

    /// The primary R2.
    #[must_use]
    pub fn r2(&self) -> Option<&RecordBuf> {
        self.r2.and_then(|i| self.records.get(i))
    }

    /// True if any primary record is flagged as part of a pair.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.primary_reads().any(|r| r.flags().is_segmented())
    }

    /// The primary records, R1 then R2.
    pub fn primary_reads(&self) -> impl Iterator<Item = &RecordBuf> {
        self.r1().into_iter().chain(self.r2())
    }

    /// The number of secondary and supplementary records.
    #[must_use]
    pub fn secondary_and_supplementary_count(&self) -> usize {
        self.records.iter().filter(|r| !is_primary(r)).count()
    }

    /// Consumes the template, returning the owned primary R1 and R2.
    #[must_use]
    pub fn into_primary_reads(mut self) -> (Option<RecordBuf>, Option<RecordBuf>) {
        let r1 = self.r1.and_then(|i| self.records.get_mut(i).map(std::mem::take));
        let r2 = self.r2.and_then(|i| self.records.get_mut(i).map(std::mem::take));
        (r1, r2)
    }

    /// Consumes the template, returning every record in input order.
    #[must_use]
    pub fn into_records(self) -> Vec<RecordBuf> {
        self.records
    }

    /// The number of records in the template.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.records.len()
    }
}

/// Groups consecutive records with the same name into [`Template`]s.
///
/// ```
/// use fgmerge_lib::template::TemplateIterator;
/// use fgmerge_sam::builder::RecordBuilder;
///
/// let records = vec![
///     RecordBuilder::new().name("a").sequence("AC").first_segment(true).build(),
///     RecordBuilder::new().name("a").sequence("GT").first_segment(false).build(),
///     RecordBuilder::new().name("b").sequence("AC").build(),
/// ];
/// let templates: Vec<_> = TemplateIterator::new(records.into_iter().map(Ok))
///     .collect::<anyhow::Result<_>>()
///     .unwrap();
/// assert_eq!(templates.len(), 2);
/// assert!(templates[0].is_paired());
/// ```
pub struct TemplateIterator<I>
where
    I: Iterator<Item = anyhow::Result<RecordBuf>>,
{
    record_iter: I,
    pending: Vec<RecordBuf>,
    pending_name: Vec<u8>,
}

impl<I> TemplateIterator<I>
where
    I: Iterator<Item = anyhow::Result<RecordBuf>>,
{
    pub fn new(record_iter: I) -> Self {
        Self { record_iter, pending: Vec::new(), pending_name: Vec::new() }
    }

    fn take_pending(&mut self) -> anyhow::Result<Template> {
        Ok(Template::from_records(std::mem::take(&mut self.pending))?)
    }
}

impl<I> Iterator for TemplateIterator<I>
where
    I: Iterator<Item = anyhow::Result<RecordBuf>>,
{
    type Item = anyhow::Result<Template>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.record_iter.next() {
                None if self.pending.is_empty() => return None,
                None => return Some(self.take_pending()),
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(record)) => {
                    let name = record_name(&record);
                    if self.pending.is_empty() || name == self.pending_name {
                        self.pending_name = name;
                        self.pending.push(record);
                    } else {
                        let template = self.take_pending();
                        self.pending_name = name;
                        self.pending.push(record);
                        return Some(template);
                    }
                }
            }
        }
    }
}
