//! SAM/BAM readers and writers.
//!
//! BAM inputs and outputs go through BGZF, which is decompressed or compressed either on the
//! calling thread (`threads <= 1`) or by a pool of `threads` workers. The aligned input may also
//! be plain SAM, which is how aligners usually stream into a pipe, so it is opened through
//! [`open_alignment_reader`] which picks the format from the path.

use anyhow::{Context, Result};
use noodles::bgzf::io::{
    MultithreadedReader, MultithreadedWriter, Reader as BgzfReader, Writer as BgzfWriter,
    multithreaded_writer, writer, writer::CompressionLevel,
};
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::num::NonZero;
use std::path::Path;

/// Buffer size used for plain-text SAM input.
const SAM_BUFFER_SIZE: usize = 256 * 1024;

/// BGZF decompression on one thread or a worker pool.
pub enum BgzfReaderEnum {
    SingleThreaded(BgzfReader<File>),
    MultiThreaded(MultithreadedReader<File>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// A BAM reader over either kind of BGZF reader.
pub type BamReaderAuto = noodles::bam::io::Reader<BgzfReaderEnum>;

/// BGZF compression on one thread or a worker pool.
pub enum BgzfWriterEnum {
    SingleThreaded(BgzfWriter<Box<dyn Write + Send>>),
    MultiThreaded(MultithreadedWriter<Box<dyn Write + Send>>),
}

impl Write for BgzfWriterEnum {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.write(buf),
            BgzfWriterEnum::MultiThreaded(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(w) => w.flush(),
            BgzfWriterEnum::MultiThreaded(w) => w.flush(),
        }
    }
}

impl BgzfWriterEnum {
    /// Flushes all pending blocks and writes the BGZF EOF marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the final blocks cannot be written.
    pub fn finish(self) -> io::Result<()> {
        match self {
            BgzfWriterEnum::SingleThreaded(mut w) => w.try_finish(),
            BgzfWriterEnum::MultiThreaded(mut w) => w.finish().map(|_| ()),
        }
    }
}

/// A BAM writer over either kind of BGZF writer.
pub type BamWriter = noodles::bam::io::Writer<BgzfWriterEnum>;

/// Returns true if the path names standard input or output.
///
/// ```
/// use fgmerge_lib::bam_io::is_stdio_path;
/// assert!(is_stdio_path("-"));
/// assert!(is_stdio_path("/dev/stdin"));
/// assert!(!is_stdio_path("aligned.sam"));
/// ```
pub fn is_stdio_path<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref().to_string_lossy();
    path == "-" || path == "/dev/stdin" || path == "/dev/stdout"
}

/// Opens a BAM file and reads its header.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the header cannot be read.
pub fn create_bam_reader<P: AsRef<Path>>(path: P, threads: usize) -> Result<(BamReaderAuto, Header)> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open input BAM: {}", path.display()))?;

    let bgzf = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(workers) => BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(workers, file)),
        None => BgzfReaderEnum::SingleThreaded(BgzfReader::new(file)),
    };

    let mut reader = noodles::bam::io::Reader::from(bgzf);
    let header =
        reader.read_header().with_context(|| format!("Failed to read header from: {}", path.display()))?;
    Ok((reader, header))
}

/// A reader for the aligned input, which may be SAM or BAM.
pub enum AlignmentReader {
    Sam(noodles::sam::io::Reader<Box<dyn BufRead + Send>>),
    Bam(BamReaderAuto),
}

impl AlignmentReader {
    /// Reads the next record into `record`, returning zero at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be decoded.
    pub fn read_record_buf(&mut self, header: &Header, record: &mut RecordBuf) -> io::Result<usize> {
        match self {
            AlignmentReader::Sam(r) => r.read_record_buf(header, record),
            AlignmentReader::Bam(r) => r.read_record_buf(header, record),
        }
    }

    /// Consumes the reader, yielding every remaining record.
    pub fn into_records(mut self, header: Header) -> impl Iterator<Item = Result<RecordBuf>> + Send {
        std::iter::from_fn(move || {
            let mut record = RecordBuf::default();
            match self.read_record_buf(&header, &mut record) {
                Ok(0) => None,
                Ok(_) => Some(Ok(record)),
                Err(e) => Some(Err(anyhow::Error::from(e).context("Failed to read aligned record"))),
            }
        })
    }
}

/// Opens the aligned input and reads its header. Paths ending in `.bam` are read as BAM;
/// anything else, including `-` for standard input, is read as SAM.
///
/// # Errors
///
/// Returns an error if the input cannot be opened or its header cannot be read.
pub fn open_alignment_reader<P: AsRef<Path>>(path: P, threads: usize) -> Result<(AlignmentReader, Header)> {
    let path = path.as_ref();

    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bam")) {
        let (reader, header) = create_bam_reader(path, threads)?;
        return Ok((AlignmentReader::Bam(reader), header));
    }

    let inner: Box<dyn BufRead + Send> = if is_stdio_path(path) {
        Box::new(BufReader::with_capacity(SAM_BUFFER_SIZE, io::stdin()))
    } else {
        let file = File::open(path)
            .with_context(|| format!("Failed to open aligned SAM: {}", path.display()))?;
        Box::new(BufReader::with_capacity(SAM_BUFFER_SIZE, file))
    };

    let mut reader = noodles::sam::io::Reader::new(inner);
    let header =
        reader.read_header().with_context(|| format!("Failed to read header from: {}", path.display()))?;
    Ok((AlignmentReader::Sam(reader), header))
}

/// Creates a BAM writer (or a stdout writer for `-`) and writes the header.
///
/// # Errors
///
/// Returns an error if the output cannot be created or the header cannot be written.
pub fn create_bam_writer<P: AsRef<Path>>(
    path: P,
    header: &Header,
    threads: usize,
    compression_level: u32,
) -> Result<BamWriter> {
    let path = path.as_ref();
    let inner: Box<dyn Write + Send> = if is_stdio_path(path) {
        Box::new(io::stdout())
    } else {
        Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create output BAM: {}", path.display()))?,
        )
    };

    #[allow(clippy::cast_possible_truncation)]
    let level = CompressionLevel::new(compression_level.min(u32::from(u8::MAX)) as u8);

    let bgzf = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(workers) => {
            let mut builder = multithreaded_writer::Builder::default().set_worker_count(workers);
            if let Some(level) = level {
                builder = builder.set_compression_level(level);
            }
            BgzfWriterEnum::MultiThreaded(builder.build_from_writer(inner))
        }
        None => {
            let mut builder = writer::Builder::default();
            if let Some(level) = level {
                builder = builder.set_compression_level(level);
            }
            BgzfWriterEnum::SingleThreaded(builder.build_from_writer(inner))
        }
    };

    let mut writer = noodles::bam::io::Writer::from(bgzf);
    writer
        .write_header(header)
        .with_context(|| format!("Failed to write header to: {}", path.display()))?;
    Ok(writer)
}

/// Finishes a BAM writer, flushing all pending blocks.
///
/// # Errors
///
/// Returns an error if the final blocks cannot be written.
pub fn finish_bam_writer(writer: BamWriter) -> Result<()> {
    writer.into_inner().finish().context("Failed to finish output BAM")
}
