/*! Line reading

[LineReader] yields the lines of a (possibly compressed) text file one by one, keeping their terminators.
The compression format is inferred from the file extension:

- `.gz`, `.gzip`: gzip (multi-member streams are supported),
- `.zst`: zstandard,
- anything else: plain text.

Lines are decoded as UTF-8; invalid data is surfaced as an [Error::Io].
!*/
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;
use log::{debug, error};

use crate::error::Error;

const BOM: char = '\u{feff}';

/// Supported on-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Zstd,
}

impl Compression {
    /// Infer compression from the path extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") | Some("gzip") => Self::Gzip,
            Some("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Reader that yields newline terminated lines.
///
/// The last line of a stream may lack its terminator.
/// A byte-order mark at the start of the stream is dropped.
pub struct LineReader<R = Box<dyn BufRead>> {
    path: PathBuf,
    br: R,
    first_line: bool,
    done: bool,
}

impl LineReader {
    /// Opens a local file, transparently decompressing it.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let compression = Compression::from_path(path);
        debug!("opening {:?} ({:?})", path, compression);

        let br: Box<dyn BufRead> = match compression {
            Compression::Plain => Box::new(BufReader::new(file)),
            Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(
                file,
            )))),
            Compression::Zstd => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            br,
            first_line: true,
            done: false,
        })
    }
}

impl<R: BufRead> LineReader<R> {
    /// Reads from any buffered source. Path is only used for logging.
    pub fn from_reader(br: R) -> Self {
        Self {
            path: PathBuf::new(),
            br,
            first_line: true,
            done: false,
        }
    }

    /// Get next line (read until `\n`)
    fn next_line(&mut self) -> Option<Result<String, Error>> {
        let mut s = String::new();
        match self.br.read_line(&mut s) {
            Ok(0) => None,
            Err(e) => {
                error!("could not read {:?}: {}", self.path, e);
                Some(Err(Error::Io(e)))
            }
            Ok(_) => {
                if self.first_line {
                    self.first_line = false;
                    if let Some(stripped) = s.strip_prefix(BOM) {
                        s = stripped.to_string();
                    }
                }
                Some(Ok(s))
            }
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let line = self.next_line();
        // do not loop on a broken stream
        if matches!(line, None | Some(Err(_))) {
            self.done = true;
        }
        line
    }
}
