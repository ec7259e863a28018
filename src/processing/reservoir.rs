/*! Bounded shuffling

[ReservoirSampler] shuffles a line stream while keeping at most `max_lines` lines in memory.
When the stream is longer than `max_lines`, the result is an approximately uniform sample of the *whole* stream,
computed in a single pass.

# Algorithm

1. **Fill**: lines are collected until `max_lines` are held or the stream ends.
   If the stream ends first, the buffer is shuffled and returned: every line was kept.
2. The total byte size of the stream is resolved ([TotalByteSize]), and the buffer is shuffled once
   so that later replacements land on random lines.
3. **Reservoir**: every following line is accepted with probability `max_lines / estimated_total_lines`,
   where `estimated_total_lines = total_byte_size / average_bytes_per_line` and the average is updated
   on every line. An accepted line overwrites the buffer slot at `write_cursor % max_lines`.
   Lines skipped by `max_words_in_sentence` count in the average, and `estimated_total_lines` is
   scaled by the share of lines that were not skipped.
4. The buffer is shuffled a last time so that replacements are not grouped by position.

The byte size only drives the sampling *quality*: a bad estimate over- or under-samples the start of the
stream, but the output always has exactly `min(lines, max_lines)` lines.

The output order is fully determined by the seed and the stream content.
!*/
use std::fmt;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Error;
use crate::filtering::{Filter, MaxWords};

use super::random::{seeded_rng, SeededRng};

/// Upper bound of the up-front allocation of a [SampleBuffer], so that a generous `max_lines`
/// on a small stream does not allocate the whole capacity.
const MAX_PREALLOCATED_LINES: usize = 1 << 20;

/// Byte size of the whole stream, either known or estimated once the buffer is filled.
pub enum TotalByteSize {
    Known(u64),
    /// Called with the average bytes per line of the fill phase, returns the predicted total byte size.
    Estimate(Box<dyn Fn(f64) -> u64>),
}

impl TotalByteSize {
    /// Builds from two mutually exclusive options, exactly one of which must be set.
    pub fn from_options(
        total_byte_size: Option<u64>,
        estimate_total_byte_size: Option<Box<dyn Fn(f64) -> u64>>,
    ) -> Result<Self, Error> {
        match (total_byte_size, estimate_total_byte_size) {
            (Some(size), None) => Ok(Self::Known(size)),
            (None, Some(estimate)) => Ok(Self::Estimate(estimate)),
            (None, None) => Err(Error::config(
                "either a total byte size or a byte size estimate must be provided",
            )),
            (Some(_), Some(_)) => Err(Error::config(
                "a total byte size and a byte size estimate are mutually exclusive",
            )),
        }
    }

    fn resolve(&self, average_bytes_per_line: f64) -> u64 {
        match self {
            Self::Known(size) => *size,
            Self::Estimate(estimate) => estimate(average_bytes_per_line),
        }
    }
}

impl fmt::Debug for TotalByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(size) => f.debug_tuple("Known").field(size).finish(),
            Self::Estimate(_) => f.write_str("Estimate(..)"),
        }
    }
}

/// Fixed capacity line buffer.
///
/// Invariant: `lines.len() <= capacity`. Once full, it is a ring buffer:
/// [SampleBuffer::overwrite] replaces the slot at `write_cursor % capacity`.
#[derive(Debug)]
struct SampleBuffer {
    lines: Vec<String>,
    capacity: usize,
    write_cursor: usize,
}

impl SampleBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity.min(MAX_PREALLOCATED_LINES)),
            capacity,
            write_cursor: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.lines.len() == self.capacity
    }

    /// Appends during the fill phase.
    fn push(&mut self, line: String) {
        debug_assert!(!self.is_full());
        self.lines.push(line);
        self.write_cursor = self.lines.len();
    }

    fn overwrite(&mut self, line: String) {
        debug_assert!(self.is_full());
        let slot = self.write_cursor % self.capacity;
        self.lines[slot] = line;
        self.write_cursor += 1;
    }

    fn shuffle(&mut self, rng: &mut SeededRng) {
        self.lines.shuffle(rng);
    }

    fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Single pass, bounded memory shuffler and sampler.
#[derive(Debug)]
pub struct ReservoirSampler {
    seed: String,
    max_lines: usize,
    total_byte_size: TotalByteSize,
    max_words: Option<MaxWords>,
}

impl ReservoirSampler {
    pub fn new(seed: &str, max_lines: usize, total_byte_size: TotalByteSize) -> Result<Self, Error> {
        if max_lines == 0 {
            return Err(Error::config("max_lines must be greater than 0"));
        }
        Ok(Self {
            seed: seed.to_string(),
            max_lines,
            total_byte_size,
            max_words: None,
        })
    }

    /// Lines with more whitespace separated tokens are skipped entirely.
    pub fn max_words_in_sentence(mut self, max_words: usize) -> Self {
        self.max_words = Some(MaxWords::with_max_words(max_words));
        self
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    fn accepts(&self, line: &str) -> bool {
        self.max_words.map_or(true, |f| f.detect(line))
    }

    /// Consumes the stream and returns at most `max_lines` shuffled lines.
    ///
    /// Errors from the stream are returned as soon as they are met.
    pub fn sample<I>(&self, line_stream: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
    {
        let mut rng = seeded_rng(&self.seed);
        let mut buffer = SampleBuffer::new(self.max_lines);
        let mut stream = line_stream.into_iter();

        // bytes and lines of everything read, including skipped lines.
        let mut total_bytes: u64 = 0;
        let mut lines_visited: u64 = 0;
        // lines that passed `max_words`
        let mut lines_eligible: u64 = 0;

        while !buffer.is_full() {
            let line = match stream.next() {
                Some(line) => line?,
                None => break,
            };
            total_bytes += line.len() as u64;
            lines_visited += 1;
            if self.accepts(&line) {
                lines_eligible += 1;
                buffer.push(line);
            }
        }

        if !buffer.is_full() {
            debug!(
                "stream ended before reaching {} lines, keeping all {} lines",
                self.max_lines,
                buffer.lines.len()
            );
            buffer.shuffle(&mut rng);
            return Ok(buffer.into_lines());
        }

        let total_byte_size = self
            .total_byte_size
            .resolve(total_bytes as f64 / self.max_lines as f64);
        debug!("buffer filled, sampling against {} total bytes", total_byte_size);
        buffer.shuffle(&mut rng);

        let mut nb_sampled: u64 = 0;
        for line in stream {
            let line = line?;
            total_bytes += line.len() as u64;
            lines_visited += 1;
            if !self.accepts(&line) {
                continue;
            }
            lines_eligible += 1;

            // adjusted on every line in case the first lines were not representative.
            // Skipped lines take up bytes of the total but are never sampled.
            let average_bytes_per_line = total_bytes as f64 / lines_visited as f64;
            let eligible_share = lines_eligible as f64 / lines_visited as f64;
            let estimated_lines = total_byte_size as f64 / average_bytes_per_line * eligible_share;
            let line_sampling_probability = self.max_lines as f64 / estimated_lines;

            if rng.gen::<f64>() < line_sampling_probability {
                buffer.overwrite(line);
                nb_sampled += 1;
            }
        }
        debug!(
            "{} lines visited, {} sampled after the buffer was filled",
            lines_visited, nb_sampled
        );

        buffer.shuffle(&mut rng);
        Ok(buffer.into_lines())
    }
}

/// Shuffle a line stream, retaining at most `max_lines` lines in memory.
///
/// See [ReservoirSampler].
pub fn shuffle_with_max_lines<I>(
    line_stream: I,
    seed: &str,
    max_lines: usize,
    total_byte_size: TotalByteSize,
    max_words_in_sentence: Option<usize>,
) -> Result<Vec<String>, Error>
where
    I: IntoIterator<Item = Result<String, Error>>,
{
    let mut sampler = ReservoirSampler::new(seed, max_lines, total_byte_size)?;
    if let Some(max_words) = max_words_in_sentence {
        sampler = sampler.max_words_in_sentence(max_words);
    }
    sampler.sample(line_stream)
}
