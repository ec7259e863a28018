//! How a merged corpus reaches its output files.
use std::path::Path;

use log::info;

use crate::error::Error;
use crate::io::reader::LineReader;
use crate::io::writer::{LineWriter, WriteLine};

use super::external::ChunkedShuffler;
use super::reservoir::{ReservoirSampler, TotalByteSize};

#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Shuffle and keep at most `max_lines` lines, sampled uniformly.
    Truncate { max_lines: usize },
    /// Shuffle everything through chunk files.
    Shuffle(ChunkedShuffler),
    /// Write lines in input order.
    Stream,
}

impl OutputMode {
    /// `max_lines` wins over `no_shuffle`: a truncated corpus is always shuffled.
    pub fn from_options(
        max_lines: Option<usize>,
        no_shuffle: bool,
        shuffler: ChunkedShuffler,
    ) -> Result<Self, Error> {
        match (max_lines, no_shuffle) {
            (Some(0), _) => Err(Error::config("max_lines must be greater than 0")),
            (Some(max_lines), _) => Ok(Self::Truncate { max_lines }),
            (None, true) => Ok(Self::Stream),
            (None, false) => Ok(Self::Shuffle(shuffler)),
        }
    }

    /// Writes `lines` to `output`, returns the number of lines written.
    ///
    /// `seed`, `total_byte_size` and `max_words_in_sentence` are only used when truncating.
    pub fn write_lines<I, W>(
        &self,
        lines: I,
        output: &mut W,
        seed: &str,
        total_byte_size: TotalByteSize,
        max_words_in_sentence: Option<usize>,
    ) -> Result<u64, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
        W: WriteLine,
    {
        match self {
            Self::Truncate { max_lines } => {
                let mut sampler = ReservoirSampler::new(seed, *max_lines, total_byte_size)?;
                if let Some(max_words) = max_words_in_sentence {
                    sampler = sampler.max_words_in_sentence(max_words);
                }
                let sample = sampler.sample(lines)?;
                for line in &sample {
                    output.write_line(line)?;
                }
                Ok(sample.len() as u64)
            }
            Self::Shuffle(shuffler) => Ok(shuffler.shuffle(lines, output)?.nb_lines),
            Self::Stream => {
                let mut written = 0;
                for line in lines {
                    output.write_line(&line?)?;
                    written += 1;
                }
                Ok(written)
            }
        }
    }
}

/// Shuffles (or samples) a single file into another one.
pub fn shuffle_file(
    input: &Path,
    output: &Path,
    seed: &str,
    mode: &OutputMode,
    total_byte_size: TotalByteSize,
) -> Result<u64, Error> {
    info!("[shuffle] {:?} -> {:?} ({:?})", input, output, mode);
    let lines = LineReader::open(input)?;
    let mut writer = LineWriter::create(output)?;
    let written = mode.write_lines(lines, &mut writer, seed, total_byte_size, None)?;
    writer.finish()?;
    info!("[shuffle] {} lines written", written);
    Ok(written)
}
