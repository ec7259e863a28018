//! Rotating chunk files for the external shuffle.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Error;

use super::WriteLine;

/// Path of the chunk `index` inside `dir`.
pub fn chunk_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("chunk.{}", index))
}

/// Rotating chunk writer.
///
/// Writes lines to `chunk.0`, `chunk.1`, … and holds a size (bytes) limit per chunk.
/// A new chunk is started when the next line would make the current one exceed the limit,
/// so the line triggering a rollover is the first line of the next chunk.
///
/// Note: if a line is larger than the whole limit, then it is an expected behaviour that
/// the size limit is ignored and the line gets a chunk of its own.
pub struct ChunkWriter {
    dst: PathBuf,
    chunk: Option<BufWriter<File>>,
    size: u64,
    size_limit: u64,
    nb_chunks: usize,
}

impl ChunkWriter {
    /// Create a new [ChunkWriter].
    /// Note that nothing is created/written unless a write is performed.
    /// size_limit is in bytes.
    pub fn new(dst: &Path, size_limit: u64) -> Self {
        Self {
            dst: dst.to_path_buf(),
            chunk: None,
            size: 0,
            size_limit,
            nb_chunks: 0,
        }
    }

    /// Rotate file.
    fn create_next_chunk(&mut self) -> std::io::Result<()> {
        if let Some(mut chunk) = self.chunk.take() {
            chunk.flush()?;
        }

        let path = chunk_path(&self.dst, self.nb_chunks);
        debug!("creating {:?}", path);
        self.chunk = Some(BufWriter::new(File::create(path)?));

        self.size = 0;
        self.nb_chunks += 1;
        Ok(())
    }

    /// Flushes the last chunk and returns the number of chunks written.
    pub fn close(mut self) -> Result<usize, Error> {
        if let Some(chunk) = &mut self.chunk {
            chunk.flush()?;
        }
        Ok(self.nb_chunks)
    }
}

impl WriteLine for ChunkWriter {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        let terminated = line.ends_with('\n');
        let nb_bytes = line.len() as u64 + u64::from(!terminated);

        // if there's no space left on the current chunk, create another one
        // ignore if the chunk is already empty (if we're already on a new chunk)
        if self.chunk.is_none() || (self.size + nb_bytes > self.size_limit && self.size > 0) {
            self.create_next_chunk()?;
        }

        if let Some(chunk) = &mut self.chunk {
            chunk.write_all(line.as_bytes())?;
            if !terminated {
                chunk.write_all(b"\n")?;
            }
            self.size += nb_bytes;
        }
        Ok(())
    }

    fn finish(self) -> Result<(), Error> {
        self.close().map(|_| ())
    }
}
