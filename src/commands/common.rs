//! CLI options shared by commands, composed with `#[command(flatten)]`.

use clap::Args;

use fgmerge_lib::validation::validate_compression_level;

/// BGZF compression of BAM output.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// Compression level for output BAM (0-12). Lower is faster with larger files.
    #[arg(long, default_value_t = 1)]
    pub compression_level: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { compression_level: 1 }
    }
}

impl CompressionOptions {
    /// # Errors
    ///
    /// Returns an error if the level is out of range.
    pub fn validate(&self) -> anyhow::Result<()> {
        Ok(validate_compression_level(self.compression_level)?)
    }
}

/// Threads used for BGZF compression and decompression.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of BGZF worker threads per BAM input and output; 1 keeps everything on the
    /// reading and writing threads.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Number of templates buffered ahead by each input reader thread.
    #[arg(short = 'b', long = "buffer", default_value_t = 10_000)]
    pub buffer: usize,
}

impl Default for ThreadingOptions {
    fn default() -> Self {
        Self { threads: 1, buffer: 10_000 }
    }
}
