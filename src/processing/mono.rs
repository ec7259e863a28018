/*! Monolingual corpus merge

Merges monolingual datasets of one language into a single file, removing:

- lines already present in the parallel corpus of that language,
- lines seen earlier in the monolingual datasets.

Lines are compared through their [hash_line] hash only, so memory use stays around
8 bytes per distinct line, whatever the line length.
!*/
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::error::Error;
use crate::filtering::{hash_line, WeakStringSet};
use crate::io::reader::{Corpus, LineReader};
use crate::io::writer::{LineWriter, WriteLine};
use crate::processing::datasets::find_mono_datasets;
use crate::processing::merge::SAMPLE_SEED;
use crate::processing::mode::OutputMode;
use crate::processing::reservoir::{ReservoirSampler, TotalByteSize};
use crate::progress::{format_bytes, format_count, ProgressLogger};
use crate::stats::{CountingStep, FilteringStep, Statistics};

pub const MONO_SEED: &str = "347489345";

pub const MAX_WORDS_IN_SENTENCE: usize = 100;

/// Share of the monolingual data expected to survive deduplication.
/// Roughly what is kept when filtering mono NLLB data against parallel NLLB data.
pub const KEPT_RATIO_ESTIMATE: f64 = 0.7;

/// Statistics of a monolingual merge, saved as `<output stem>.stats.json`.
#[derive(Debug, Clone, Serialize)]
pub struct MonoStatistics {
    pub parallel_corpus_lines: CountingStep,
    pub duplicates_of_parallel_corpus: CountingStep,
    pub duplicates_of_monolingual_corpus: CountingStep,
    pub deduplicated_size: FilteringStep,
    pub deduplicated_monolingual_lines: CountingStep,
    pub final_truncated_monolingual_lines: CountingStep,
    pub final_truncated_monolingual_codepoints: CountingStep,
}

impl Default for MonoStatistics {
    fn default() -> Self {
        Self {
            parallel_corpus_lines: CountingStep::new("The size of the merged parallel corpus before truncation."),
            duplicates_of_parallel_corpus: CountingStep::new(
                "How much of the monolingual data was duplicated in the merged parallel corpus.",
            ),
            duplicates_of_monolingual_corpus: CountingStep::new(
                "How much of the monolingual data was duplicated across the monolingual datasets.",
            ),
            deduplicated_size: FilteringStep::new(
                "What was the size of the monolingual data and how much was deduplicated.",
            ),
            deduplicated_monolingual_lines: CountingStep::new(
                "After deduplication, how much monolingual data is left.",
            ),
            final_truncated_monolingual_lines: CountingStep::new(
                "After truncation via max_lines, how many lines are left.",
            ),
            final_truncated_monolingual_codepoints: CountingStep::new(
                "The amount of codepoints in the final monolingual corpus.",
            ),
        }
    }
}

impl Statistics for MonoStatistics {
    fn update_derived_data(&mut self) {
        self.deduplicated_size.update_derived_data();
    }
}

/// Hashes every line of a (parallel) corpus side.
pub fn compute_line_hashes(path: &Path) -> Result<WeakStringSet, Error> {
    let mut hashes = WeakStringSet::new();
    let mut progress = ProgressLogger::new("hashing");
    progress.start();
    for line in LineReader::open(path)? {
        let line = line?;
        progress.tick(line.len());
        hashes.add(&line);
    }
    progress.stop();
    Ok(hashes)
}

/// Removes lines of the parallel corpus and repeated lines from a line stream.
///
/// Lines of the parallel corpus are counted as such even when they are repeated in the stream.
pub struct DedupMono<'p, I> {
    lines: I,
    parallel_hashes: &'p WeakStringSet,
    mono_hashes: WeakStringSet,
    parallel_discards: u64,
    mono_discards: u64,
    retained: u64,
}

impl<'p, I> DedupMono<'p, I>
where
    I: Iterator<Item = Result<String, Error>>,
{
    pub fn new(lines: I, parallel_hashes: &'p WeakStringSet) -> Self {
        Self {
            lines,
            parallel_hashes,
            mono_hashes: WeakStringSet::new(),
            parallel_discards: 0,
            mono_discards: 0,
            retained: 0,
        }
    }

    pub fn parallel_discards(&self) -> u64 {
        self.parallel_discards
    }

    pub fn mono_discards(&self) -> u64 {
        self.mono_discards
    }

    pub fn retained(&self) -> u64 {
        self.retained
    }
}

impl<'p, I> Iterator for DedupMono<'p, I>
where
    I: Iterator<Item = Result<String, Error>>,
{
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            let hash = hash_line(&line);
            if self.parallel_hashes.contains_hash(hash) {
                self.parallel_discards += 1;
            } else if !self.mono_hashes.insert_hash(hash) {
                self.mono_discards += 1;
            } else {
                self.retained += 1;
                if self.retained % 1_000_000 == 0 {
                    info!(
                        "{} kept, {} discarded",
                        format_count(self.retained),
                        format_count(self.parallel_discards + self.mono_discards)
                    );
                }
                return Some(Ok(line));
            }
        }
        None
    }
}

/// Line sink counting lines and codepoints of what goes through.
struct CountingWriter<W> {
    inner: W,
    lines: u64,
    codepoints: u64,
    progress: ProgressLogger,
}

impl<W: WriteLine> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            lines: 0,
            codepoints: 0,
            progress: ProgressLogger::new("write"),
        }
    }
}

impl<W: WriteLine> WriteLine for CountingWriter<W> {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.lines += 1;
        self.codepoints += line.chars().count() as u64;
        self.progress.tick(line.len());
        self.inner.write_line(line)
    }

    fn finish(mut self) -> Result<(), Error> {
        self.progress.stop();
        self.inner.finish()
    }
}

/// Deduplicates `mono_datasets` against `parallel_hashes` and themselves, writing the result to `output`.
///
/// `byte_size_estimate` is the expected size of the deduplicated data, used when `mode` truncates.
/// Truncation also skips lines of more than [MAX_WORDS_IN_SENTENCE] words.
pub fn filter_and_write_monolingual_data<P, W>(
    mono_datasets: &[P],
    output: W,
    parallel_hashes: &WeakStringSet,
    byte_size_estimate: u64,
    mode: &OutputMode,
) -> Result<MonoStatistics, Error>
where
    P: AsRef<Path>,
    W: WriteLine,
{
    let mut stats = MonoStatistics::default();
    stats.parallel_corpus_lines.value = parallel_hashes.len() as u64;

    let corpus = Corpus::new(mono_datasets).with_logging();
    let mut dedup = DedupMono::new(corpus, parallel_hashes);
    let mut writer = CountingWriter::new(output);

    info!("Deduplicate and shuffle lines.");
    mode.write_lines(
        dedup.by_ref(),
        &mut writer,
        MONO_SEED,
        TotalByteSize::Known(byte_size_estimate),
        Some(MAX_WORDS_IN_SENTENCE),
    )?;

    stats.duplicates_of_parallel_corpus.value = dedup.parallel_discards();
    stats.duplicates_of_monolingual_corpus.value = dedup.mono_discards();
    stats.deduplicated_monolingual_lines.value = dedup.retained();
    stats.deduplicated_size.kept = dedup.retained();
    stats.deduplicated_size.filtered = dedup.parallel_discards() + dedup.mono_discards();
    stats.final_truncated_monolingual_lines.value = writer.lines;
    stats.final_truncated_monolingual_codepoints.value = writer.codepoints;

    writer.finish()?;
    Ok(stats)
}

/// Writes a sample of a monolingual file, starting with a byte-order mark.
pub fn sample_mono(path: &Path, sample_path: &Path, sample_size: usize) -> Result<(), Error> {
    let total_byte_size = std::fs::metadata(path)?.len();
    let sampler = ReservoirSampler::new(SAMPLE_SEED, sample_size, TotalByteSize::Known(total_byte_size))?
        .max_words_in_sentence(MAX_WORDS_IN_SENTENCE);

    info!(
        "Write a {} line sample of the final: {:?}",
        format_count(sample_size as u64),
        sample_path
    );
    let mut writer = LineWriter::with_bom(sample_path)?;
    for line in sampler.sample(LineReader::open(path)?)? {
        writer.write_line(&line)?;
    }
    writer.finish()
}

/// Path of `<parent>/<stem>.<suffix>`, e.g. `mono.ru.zst` gives `mono.ru.sample.txt`.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}", stem, suffix))
}

/// Monolingual merge settings.
#[derive(Debug, Clone)]
pub struct MergeMono {
    pub parallel_corpus: PathBuf,
    pub output: PathBuf,
    pub datasets_glob: String,
    pub sample_size: usize,
    pub mode: OutputMode,
}

impl MergeMono {
    pub fn sample_path(&self) -> PathBuf {
        sibling_path(&self.output, "sample.txt")
    }

    /// Discovers the datasets, merges them, then writes the sample and the statistics.
    pub fn run(&self) -> Result<MonoStatistics, Error> {
        if self.sample_size == 0 {
            return Err(Error::config("sample_size must be greater than 0"));
        }

        info!("Monolingual datasets:");
        let (mono_datasets, total_bytes) = find_mono_datasets(&self.datasets_glob)?;
        let byte_size_estimate = (total_bytes as f64 * KEPT_RATIO_ESTIMATE) as u64;
        info!(
            "Expecting about {} of deduplicated data",
            format_bytes(byte_size_estimate)
        );

        if let Some(parent) = self.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Compute hashes of the parallel data: {:?}", self.parallel_corpus);
        let parallel_hashes = compute_line_hashes(&self.parallel_corpus)?;

        info!("Write the final file: {:?}", self.output);
        let mut stats = filter_and_write_monolingual_data(
            &mono_datasets,
            LineWriter::create(&self.output)?,
            &parallel_hashes,
            byte_size_estimate,
            &self.mode,
        )?;

        sample_mono(&self.output, &self.sample_path(), self.sample_size)?;

        let stats_path = stats.save_json(&self.output)?;
        info!("[merge-mono] statistics saved to {:?}", stats_path);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, lines: &[&str]) {
        let mut w = LineWriter::create(path).unwrap();
        for line in lines {
            w.write_line(line).unwrap();
        }
        w.finish().unwrap();
    }

    fn stream(lines: &[&str]) -> impl Iterator<Item = Result<String, Error>> {
        lines
            .iter()
            .map(|line| Ok(line.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn dedup_attribution() {
        let parallel: WeakStringSet = ["shared\n"].into_iter().collect();
        let mut dedup = DedupMono::new(
            stream(&["a\n", "shared\n", "b\n", "a\n", "shared\n", " a \n"]),
            &parallel,
        );
        let kept: Vec<String> = dedup.by_ref().map(Result::unwrap).collect();

        assert_eq!(kept, vec!["a\n", "b\n"]);
        assert_eq!(dedup.parallel_discards(), 2);
        assert_eq!(dedup.mono_discards(), 2);
        assert_eq!(dedup.retained(), 2);
    }

    #[test]
    fn hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.ru.zst");
        write(&path, &["a\n", "b\n", "a\n"]);
        let hashes = compute_line_hashes(&path).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains("a"));
    }

    #[test]
    fn codepoints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.ru.zst");
        write(&path, &["привет\n", "мир\n", "привет\n"]);

        let mut output = Vec::new();
        let stats = filter_and_write_monolingual_data(
            &[&path],
            &mut output,
            &WeakStringSet::new(),
            100,
            &OutputMode::Stream,
        )
        .unwrap();

        assert_eq!(output, vec!["привет\n", "мир\n"]);
        assert_eq!(stats.final_truncated_monolingual_lines.value, 2);
        assert_eq!(stats.final_truncated_monolingual_codepoints.value, 7 + 4);
        assert_eq!(stats.duplicates_of_monolingual_corpus.value, 1);
    }

    #[test]
    fn max_words_only_when_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.ru.zst");
        let long = format!("{}\n", "word ".repeat(MAX_WORDS_IN_SENTENCE + 1));
        write(&path, &["short\n", &long]);

        let mut output = Vec::new();
        filter_and_write_monolingual_data(
            &[&path],
            &mut output,
            &WeakStringSet::new(),
            100,
            &OutputMode::Stream,
        )
        .unwrap();
        assert_eq!(output.len(), 2);

        let mut output = Vec::new();
        filter_and_write_monolingual_data(
            &[&path],
            &mut output,
            &WeakStringSet::new(),
            100,
            &OutputMode::Truncate { max_lines: 10 },
        )
        .unwrap();
        assert_eq!(output, vec!["short\n"]);
    }

    #[test]
    fn sibling() {
        assert_eq!(
            sibling_path(Path::new("artifacts/mono.ru.zst"), "sample.txt"),
            PathBuf::from("artifacts/mono.ru.sample.txt")
        );
    }
}
