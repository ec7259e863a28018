//! Line writers for text, gzip and zstandard files.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use log::debug;

use crate::error::Error;
use crate::io::reader::Compression;

use super::WriteLine;

/// Byte-order mark, so that browsers detect UTF-8 on plain text samples.
const BOM: &str = "\u{feff}";

enum Encoder {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

impl Write for Encoder {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Zstd(w) => w.flush(),
        }
    }
}

/// Writes lines to a file, compressing according to its extension (see [Compression::from_path]).
///
/// The parent directory must exist.
/// Compressed streams are only complete after [WriteLine::finish] has been called.
pub struct LineWriter {
    path: PathBuf,
    inner: Encoder,
    nb_lines: u64,
}

impl LineWriter {
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = BufWriter::new(File::create(path)?);
        let inner = match Compression::from_path(path) {
            Compression::Plain => Encoder::Plain(file),
            Compression::Gzip => Encoder::Gzip(GzEncoder::new(file, flate2::Compression::default())),
            Compression::Zstd => Encoder::Zstd(zstd::stream::write::Encoder::new(file, 0)?),
        };
        debug!("writing to {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            nb_lines: 0,
        })
    }

    /// Creates a writer that starts the file with a UTF-8 byte-order mark.
    pub fn with_bom(path: &Path) -> Result<Self, Error> {
        let mut w = Self::create(path)?;
        w.inner.write_all(BOM.as_bytes())?;
        Ok(w)
    }
}

impl WriteLine for LineWriter {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.inner.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.inner.write_all(b"\n")?;
        }
        self.nb_lines += 1;
        Ok(())
    }

    fn finish(self) -> Result<(), Error> {
        match self.inner {
            Encoder::Plain(mut w) => w.flush()?,
            Encoder::Gzip(w) => w.finish()?.flush()?,
            Encoder::Zstd(w) => w.finish()?.flush()?,
        };
        debug!("closed {:?} ({} lines)", self.path, self.nb_lines);
        Ok(())
    }
}

/// Writes `src\ttrg` units to two line writers, one per side.
pub struct ParallelWriter<W = LineWriter> {
    src: W,
    trg: W,
}

impl<W: WriteLine> ParallelWriter<W> {
    pub fn new(src: W, trg: W) -> Self {
        Self { src, trg }
    }

    pub fn write_pair(&mut self, src_line: &str, trg_line: &str) -> Result<(), Error> {
        self.src.write_line(src_line)?;
        self.trg.write_line(trg_line)
    }

    pub fn into_inner(self) -> (W, W) {
        (self.src, self.trg)
    }
}

impl<W: WriteLine> WriteLine for ParallelWriter<W> {
    /// Splits the unit on its first tab.
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        let (src_line, trg_line) = line
            .split_once('\t')
            .ok_or_else(|| Error::Custom(format!("no tab separator in parallel line {:?}", line)))?;
        // the source side lost its terminator when the pair was joined
        let src_line = format!("{}\n", src_line);
        self.write_pair(&src_line, trg_line)
    }

    fn finish(self) -> Result<(), Error> {
        self.src.finish()?;
        self.trg.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::io::reader::LineReader;

    use super::*;

    fn read_all(path: &Path) -> String {
        LineReader::open(path)
            .unwrap()
            .collect::<Result<String, _>>()
            .unwrap()
    }

    #[test]
    fn write_compressed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["out.txt", "out.txt.gz", "out.txt.zst"] {
            let path = dir.path().join(name);
            let mut w = LineWriter::create(&path).unwrap();
            w.write_line("line 1\n").unwrap();
            w.write_line("line 2").unwrap();
            w.finish().unwrap();

            assert_eq!(read_all(&path), "line 1\nline 2\n", "{}", name);
        }
    }

    #[test]
    fn write_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        let mut w = LineWriter::with_bom(&path).unwrap();
        w.write_line("échantillon\n").unwrap();
        w.finish().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..3], &[0xef, 0xbb, 0xbf]);
        // the reader drops the mark
        assert_eq!(read_all(&path), "échantillon\n");
    }

    #[test]
    fn parallel_split() {
        let mut w = ParallelWriter::new(Vec::new(), Vec::new());
        w.write_line("hello\tпривет\n").unwrap();
        w.write_pair("a\n", "б\n").unwrap();
        assert!(w.write_line("no tab\n").is_err());

        let (src, trg) = w.into_inner();
        assert_eq!(src, vec!["hello\n", "a\n"]);
        assert_eq!(trg, vec!["привет\n", "б\n"]);
    }
}
