/*! External shuffling

Shuffles streams that do not fit in memory, using the disk as scratch space:

1. the stream is partitioned into sequentially numbered chunk files of at most `chunk_bytes` bytes
   (see [ChunkWriter]; a single oversized line gets a chunk of its own),
2. the chunk order is shuffled,
3. chunks are read whole, in that order, into an in-memory bucket.
   Whenever the bucket holds more than `bucket_bytes` bytes after a chunk was read, it is shuffled
   and written out, then emptied,
4. the last, partial bucket is shuffled and written out.

Buckets always contain whole chunks, so memory can exceed `bucket_bytes` by up to one chunk.

Lines are written out as they were read, terminators included.
A line missing its final `\n` gets one when written to a chunk.
!*/
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use tempfile::TempDir;

use crate::error::Error;
use crate::io::writer::{chunk_path, ChunkWriter, WriteLine};
use crate::progress::format_bytes;

use super::random::{seeded_rng, SeededRng};

/// What a shuffle went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShuffleReport {
    pub nb_lines: u64,
    pub nb_chunks: usize,
    pub nb_buckets: usize,
}

/// Shuffles line streams of any size through chunk files.
#[derive(Debug, Clone)]
pub struct ChunkedShuffler {
    seed: String,
    chunk_bytes: u64,
    bucket_bytes: u64,
    chunk_dir: Option<PathBuf>,
    keep_chunks: bool,
}

impl ChunkedShuffler {
    pub fn new(seed: &str, chunk_bytes: u64, bucket_bytes: u64) -> Result<Self, Error> {
        if chunk_bytes == 0 {
            return Err(Error::config("chunk_bytes must be greater than 0"));
        }
        if bucket_bytes == 0 {
            return Err(Error::config("bucket_bytes must be greater than 0"));
        }
        Ok(Self {
            seed: seed.to_string(),
            chunk_bytes,
            bucket_bytes,
            chunk_dir: None,
            keep_chunks: false,
        })
    }

    /// Directory where chunks are written.
    ///
    /// Defaults to a new `mtcorpus-chunks-*` directory inside the system temporary directory for
    /// every shuffle, removed once the shuffle is done. It is left on disk when the shuffle fails
    /// or when chunks are kept.
    /// Two shuffles running at the same time must not share a directory.
    pub fn chunk_dir(mut self, chunk_dir: &Path) -> Self {
        self.chunk_dir = Some(chunk_dir.to_path_buf());
        self
    }

    /// Keep the chunk files after the shuffle, for debugging.
    pub fn keep_chunks(mut self, keep_chunks: bool) -> Self {
        self.keep_chunks = keep_chunks;
        self
    }

    /// Shuffles `line_stream` into `output`.
    ///
    /// Errors from the stream or from the file system abort the shuffle.
    pub fn shuffle<I, W>(&self, line_stream: I, output: &mut W) -> Result<ShuffleReport, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
        W: WriteLine,
    {
        let chunk_dir = match &self.chunk_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                return self.shuffle_in(dir, line_stream, output);
            }
            None => tempfile::Builder::new().prefix("mtcorpus-chunks-").tempdir()?,
        };

        let result = self.shuffle_in(chunk_dir.path(), line_stream, output);
        release_chunk_dir(chunk_dir, result, self.keep_chunks)
    }

    fn shuffle_in<I, W>(&self, chunk_dir: &Path, line_stream: I, output: &mut W) -> Result<ShuffleReport, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
        W: WriteLine,
    {
        let mut report = ShuffleReport::default();

        let mut chunk_writer = ChunkWriter::new(chunk_dir, self.chunk_bytes);
        for line in line_stream {
            chunk_writer.write_line(&line?)?;
            report.nb_lines += 1;
        }
        report.nb_chunks = chunk_writer.close()?;
        info!(
            "[shuffle] {} lines split into {} chunks of at most {} in {:?}",
            report.nb_lines,
            report.nb_chunks,
            format_bytes(self.chunk_bytes),
            chunk_dir
        );

        let mut rng = seeded_rng(&self.seed);
        let mut chunk_order: Vec<usize> = (0..report.nb_chunks).collect();
        chunk_order.shuffle(&mut rng);

        let mut bucket = Bucket::default();
        for index in chunk_order {
            let path = chunk_path(chunk_dir, index);
            bucket.read_chunk(&path)?;
            if bucket.bytes > self.bucket_bytes {
                bucket.flush(&mut rng, output)?;
                report.nb_buckets += 1;
            }
            if !self.keep_chunks {
                fs::remove_file(&path)?;
            }
        }
        if !bucket.lines.is_empty() {
            bucket.flush(&mut rng, output)?;
            report.nb_buckets += 1;
        }

        info!("[shuffle] {} buckets written", report.nb_buckets);
        Ok(report)
    }
}

/// Removes a temporary chunk directory after a successful shuffle.
/// Failed shuffles leave their partial chunks on disk.
fn release_chunk_dir(
    chunk_dir: TempDir,
    result: Result<ShuffleReport, Error>,
    keep_chunks: bool,
) -> Result<ShuffleReport, Error> {
    match result {
        Ok(report) if !keep_chunks => {
            chunk_dir.close()?;
            Ok(report)
        }
        Ok(report) => {
            info!("[shuffle] chunks kept in {:?}", chunk_dir.into_path());
            Ok(report)
        }
        Err(e) => {
            warn!("[shuffle] failed, chunks left in {:?}", chunk_dir.into_path());
            Err(e)
        }
    }
}

#[derive(Debug, Default)]
struct Bucket {
    lines: Vec<String>,
    bytes: u64,
}

impl Bucket {
    /// Appends every line of a chunk.
    fn read_chunk(&mut self, path: &Path) -> Result<(), Error> {
        debug!("reading {:?}", path);
        let mut reader = BufReader::new(File::open(path)?);
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Ok(());
            }
            self.bytes += read as u64;
            self.lines.push(line);
        }
    }

    fn flush<W: WriteLine>(&mut self, rng: &mut SeededRng, output: &mut W) -> Result<(), Error> {
        debug!(
            "writing bucket of {} lines ({})",
            self.lines.len(),
            format_bytes(self.bytes)
        );
        self.lines.shuffle(rng);
        for line in self.lines.drain(..) {
            output.write_line(&line)?;
        }
        self.bytes = 0;
        Ok(())
    }
}

/// Shuffle a line stream of any size through chunk files in `chunk_dir`.
///
/// See [ChunkedShuffler].
pub fn shuffle_in_temp_files<I, W>(
    line_stream: I,
    output: &mut W,
    seed: &str,
    chunk_bytes: u64,
    bucket_bytes: u64,
    chunk_dir: &Path,
    keep_chunks: bool,
) -> Result<ShuffleReport, Error>
where
    I: IntoIterator<Item = Result<String, Error>>,
    W: WriteLine,
{
    ChunkedShuffler::new(seed, chunk_bytes, bucket_bytes)?
        .chunk_dir(chunk_dir)
        .keep_chunks(keep_chunks)
        .shuffle(line_stream, output)
}
