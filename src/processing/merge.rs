/*! Parallel corpus merge

Merges the `<dataset>.<src>.zst`/`<dataset>.<trg>.zst` pairs of several datasets into a single
`<name>.<src>.zst`/`<name>.<trg>.zst` pair:

```text
ada83_v1.en.zst  ada83_v1.ru.zst
wiki_v2.en.zst   wiki_v2.ru.zst     ──▶  corpus.en.zst  corpus.ru.zst
books_v1.en.zst  books_v1.ru.zst
```

Sentence pairs are deduplicated on their concatenation across every dataset, then shuffled
(and optionally truncated) according to an [OutputMode].
A small human readable sample and a statistics document are written next to the output.
!*/
use std::fs;
use std::path::{Path, PathBuf};

use itertools::{EitherOrBoth, Itertools, ZipLongest};
use log::{error, info};
use serde::Serialize;

use crate::error::Error;
use crate::filtering::{FilterMut, WeakStringSet};
use crate::io::reader::LineReader;
use crate::io::writer::{LineWriter, ParallelWriter, WriteLine};
use crate::processing::datasets::{dataset_stem, find_parallel_datasets};
use crate::processing::mode::OutputMode;
use crate::processing::reservoir::{ReservoirSampler, TotalByteSize};
use crate::progress::format_count;
use crate::stats::{FilteringStep, Statistics};

pub const CORPUS_SEED: &str = "38540735095";
pub const SAMPLE_SEED: &str = "9834523434";

/// Statistics of a parallel merge, saved as `<name>.stats.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ParallelStatistics {
    pub parallel_corpus: FilteringStep,
    pub final_truncated: FilteringStep,
    pub datasets: Vec<FilteringStep>,
}

impl Default for ParallelStatistics {
    fn default() -> Self {
        Self {
            parallel_corpus: FilteringStep::new("The parallel corpora are merged and deduplicated"),
            final_truncated: FilteringStep::new("The final result can be truncated by max_lines"),
            datasets: Vec::new(),
        }
    }
}

impl ParallelStatistics {
    /// Starts counting a new dataset, named after its stem (`/path/to/ada83_v1.en.zst` is `ada83_v1`).
    pub fn add_parallel_dataset(&mut self, location: &Path) -> &mut FilteringStep {
        self.datasets.push(FilteringStep::new(&dataset_stem(location)));
        // just pushed
        let last = self.datasets.len() - 1;
        &mut self.datasets[last]
    }
}

impl Statistics for ParallelStatistics {
    fn update_derived_data(&mut self) {
        self.parallel_corpus.update_derived_data();
        self.final_truncated.update_derived_data();
        for dataset in &mut self.datasets {
            dataset.update_derived_data();
        }
    }
}

struct OpenPair {
    src_path: PathBuf,
    trg_path: PathBuf,
    lines: ZipLongest<LineReader, LineReader>,
}

impl OpenPair {
    fn open(src_path: PathBuf, trg_path: PathBuf) -> Result<Self, Error> {
        let lines = LineReader::open(&src_path)?.zip_longest(LineReader::open(&trg_path)?);
        Ok(Self {
            src_path,
            trg_path,
            lines,
        })
    }
}

/// Iterator over the deduplicated sentence pairs of several datasets, in dataset order.
///
/// Pairs are compared on `src_line + trg_line`, terminators included.
/// Datasets whose sides have a different number of lines are an error.
pub struct DedupPairs<'s> {
    pairs: std::vec::IntoIter<(PathBuf, PathBuf)>,
    current: Option<OpenPair>,
    seen: WeakStringSet,
    stats: &'s mut ParallelStatistics,
}

impl<'s> DedupPairs<'s> {
    pub fn new(
        pairs: Vec<(PathBuf, PathBuf)>,
        seen: WeakStringSet,
        stats: &'s mut ParallelStatistics,
    ) -> Self {
        Self {
            pairs: pairs.into_iter(),
            current: None,
            seen,
            stats,
        }
    }

    /// Opens the next dataset pair, returns [None] when there's none left.
    fn open_next(&mut self) -> Option<Result<(), Error>> {
        let (src_path, trg_path) = self.pairs.next()?;
        info!("Reading dataset {:?}", src_path);
        info!("Reading dataset {:?}", trg_path);
        self.stats.add_parallel_dataset(&src_path);
        Some(OpenPair::open(src_path, trg_path).map(|pair| self.current = Some(pair)))
    }

    fn mismatch(&self) -> Error {
        match &self.current {
            Some(pair) => Error::Custom(format!(
                "{:?} and {:?} do not have the same number of lines",
                pair.src_path, pair.trg_path
            )),
            None => Error::Custom("parallel datasets do not have the same number of lines".to_string()),
        }
    }
}

impl<'s> Iterator for DedupPairs<'s> {
    type Item = Result<(String, String), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if let Err(e) = self.open_next()? {
                    return Some(Err(e));
                }
            }
            let next = match &mut self.current {
                Some(pair) => pair.lines.next(),
                None => continue,
            };

            let (src_line, trg_line) = match next {
                Some(EitherOrBoth::Both(Ok(src_line), Ok(trg_line))) => (src_line, trg_line),
                Some(EitherOrBoth::Both(Err(e), _))
                | Some(EitherOrBoth::Both(_, Err(e)))
                | Some(EitherOrBoth::Left(Err(e)))
                | Some(EitherOrBoth::Right(Err(e))) => return Some(Err(e)),
                Some(EitherOrBoth::Left(_)) | Some(EitherOrBoth::Right(_)) => {
                    let e = self.mismatch();
                    self.current = None;
                    return Some(Err(e));
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            // no separator needed, the source line carries its newline
            let key = format!("{}{}", src_line, trg_line);
            let is_new = self.seen.detect_mut(&key);

            let dataset = self.stats.datasets.last_mut();
            if is_new {
                self.stats.parallel_corpus.kept += 1;
                if let Some(dataset) = dataset {
                    dataset.kept += 1;
                }
                return Some(Ok((src_line, trg_line)));
            }
            self.stats.parallel_corpus.filtered += 1;
            if let Some(dataset) = dataset {
                dataset.filtered += 1;
            }
        }
    }
}

fn trim_newline(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

/// Joins a pair into a single `src\ttrg\n` line, or [None] if either side contains a tab.
fn join_pair(src_line: &str, trg_line: &str) -> Option<String> {
    if src_line.contains('\t') || trg_line.contains('\t') {
        error!("A line contained a tab character, skipping:");
        error!(" src: {}", src_line);
        error!(" trg: {}", trg_line);
        return None;
    }
    Some(format!("{}\t{}", trim_newline(src_line), trg_line))
}

fn joined_lines<I>(pairs: I) -> impl Iterator<Item = Result<String, Error>>
where
    I: Iterator<Item = Result<(String, String), Error>>,
{
    pairs.filter_map(|pair| match pair {
        Ok((src_line, trg_line)) => join_pair(&src_line, &trg_line).map(Ok),
        Err(e) => Some(Err(e)),
    })
}

/// Deduplicates a list of parallel datasets into a single parallel corpus.
pub struct DeduplicateCorpus {
    pairs: Vec<(PathBuf, PathBuf)>,
    seen: WeakStringSet,
}

impl DeduplicateCorpus {
    pub fn new(pairs: Vec<(PathBuf, PathBuf)>) -> Self {
        Self {
            pairs,
            seen: WeakStringSet::new(),
        }
    }

    /// Pairs already present in `seen` are filtered out.
    pub fn with_seen(mut self, seen: WeakStringSet) -> Self {
        self.seen = seen;
        self
    }

    /// Merges the datasets into `output`.
    ///
    /// `total_corpus_bytes` is the byte size used by the reservoir sampler when the mode truncates.
    /// `output` is not finished.
    pub fn run<W: WriteLine>(
        self,
        output: &mut ParallelWriter<W>,
        total_corpus_bytes: u64,
        mode: &OutputMode,
    ) -> Result<ParallelStatistics, Error> {
        let mut stats = ParallelStatistics::default();
        let mut pairs = DedupPairs::new(self.pairs, self.seen, &mut stats);

        let written = match mode {
            OutputMode::Stream => {
                let mut written = 0;
                for pair in pairs.by_ref() {
                    let (src_line, trg_line) = pair?;
                    output.write_pair(&src_line, &trg_line)?;
                    written += 1;
                }
                written
            }
            // tab joined units, see join_pair
            _ => mode.write_lines(
                joined_lines(pairs.by_ref()),
                output,
                CORPUS_SEED,
                TotalByteSize::Known(total_corpus_bytes),
                None,
            )?,
        };
        drop(pairs);

        stats.final_truncated.visited = stats.parallel_corpus.kept;
        stats.final_truncated.kept = written;
        stats.final_truncated.filtered = stats.parallel_corpus.kept.saturating_sub(written);
        info!(
            "[merge-corpus] {} pairs kept out of {}, {} written",
            format_count(stats.parallel_corpus.kept),
            format_count(stats.parallel_corpus.kept + stats.parallel_corpus.filtered),
            format_count(written)
        );
        Ok(stats)
    }
}

/// Writes a sample of a parallel corpus, for a quick human review.
///
/// Each sampled pair is written as the source line, the target line and an empty line:
///
/// ```text
/// Sentence 1 in source language
/// Sentence 1 in target language
///
/// Sentence 2 in source language
/// Sentence 2 in target language
///
/// ```
///
/// The file starts with a byte-order mark so that browsers pick the right encoding.
pub fn sample_corpus(
    sample_path: &Path,
    sample_size: usize,
    src_outpath: &Path,
    trg_outpath: &Path,
) -> Result<(), Error> {
    let total_byte_size = fs::metadata(src_outpath)?.len() + fs::metadata(trg_outpath)?.len();
    let sampler = ReservoirSampler::new(SAMPLE_SEED, sample_size, TotalByteSize::Known(total_byte_size))?;

    info!("Stream in:");
    info!(" - {:?}", src_outpath);
    info!(" - {:?}", trg_outpath);
    info!(
        "Write a {} line sample of the merged corpus:",
        format_count(sample_size as u64)
    );
    info!(" - {:?}", sample_path);

    let src_lines = LineReader::open(src_outpath)?;
    let trg_lines = LineReader::open(trg_outpath)?;
    let units = src_lines
        .zip(trg_lines)
        .map(|(src_line, trg_line)| -> Result<String, Error> {
            let (src_line, trg_line) = (src_line?, trg_line?);
            Ok(format!("{}\n{}\n\n", trim_newline(&src_line), trim_newline(&trg_line)))
        });

    let mut writer = LineWriter::with_bom(sample_path)?;
    for unit in sampler.sample(units)? {
        writer.write_line(&unit)?;
    }
    writer.finish()
}

/// Parallel merge settings.
#[derive(Debug, Clone)]
pub struct MergeCorpus {
    pub src: String,
    pub trg: String,
    pub datasets_glob: String,
    pub artifacts: PathBuf,
    pub name: String,
    pub sample_size: usize,
    pub mode: OutputMode,
}

impl MergeCorpus {
    pub fn src_outpath(&self) -> PathBuf {
        self.artifacts.join(format!("{}.{}.zst", self.name, self.src))
    }

    pub fn trg_outpath(&self) -> PathBuf {
        self.artifacts.join(format!("{}.{}.zst", self.name, self.trg))
    }

    pub fn sample_path(&self) -> PathBuf {
        self.artifacts.join(format!("{}.sample.txt", self.name))
    }

    /// Discovers the datasets, merges them, then writes the sample and the statistics.
    pub fn run(&self) -> Result<ParallelStatistics, Error> {
        if self.sample_size == 0 {
            return Err(Error::config("sample_size must be greater than 0"));
        }

        info!("Parallel datasets:");
        let datasets = find_parallel_datasets(&self.src, &self.trg, &self.datasets_glob)?;

        fs::create_dir_all(&self.artifacts)?;
        let src_outpath = self.src_outpath();
        let trg_outpath = self.trg_outpath();
        let mut output = ParallelWriter::new(
            LineWriter::create(&src_outpath)?,
            LineWriter::create(&trg_outpath)?,
        );

        let mut stats =
            DeduplicateCorpus::new(datasets.pairs).run(&mut output, datasets.total_bytes, &self.mode)?;
        output.finish()?;

        sample_corpus(&self.sample_path(), self.sample_size, &src_outpath, &trg_outpath)?;

        // `<name>.stats.json`, even when the name contains dots
        let stats_path = stats.save_json(&self.artifacts.join(format!("{}.zst", self.name)))?;
        info!("[merge-corpus] statistics saved to {:?}", stats_path);
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

    fn dataset(dir: &Path, name: &str, src: &[&str], trg: &[&str]) -> (PathBuf, PathBuf) {
        let src_path = dir.join(format!("{}.en.zst", name));
        let trg_path = dir.join(format!("{}.ru.zst", name));
        write(&src_path, src);
        write(&trg_path, trg);
        (src_path, trg_path)
    }

    fn run(pairs: Vec<(PathBuf, PathBuf)>, mode: &OutputMode) -> (Vec<String>, Vec<String>, ParallelStatistics) {
        let mut output = ParallelWriter::new(Vec::new(), Vec::new());
        let mut stats = DeduplicateCorpus::new(pairs).run(&mut output, 1_000, mode).unwrap();
        stats.update_derived_data();
        let (src, trg) = output.into_inner();
        (src, trg, stats)
    }

    #[test]
    fn dedup_across_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let a = dataset(dir.path(), "a_v1", &["1\n", "2\n", "1\n"], &["un\n", "deux\n", "un\n"]);
        // same source, different target: kept
        let b = dataset(dir.path(), "b_v1", &["2\n", "1\n"], &["deux\n", "one\n"]);

        let (src, trg, stats) = run(vec![a, b], &OutputMode::Stream);
        assert_eq!(src, vec!["1\n", "2\n", "1\n"]);
        assert_eq!(trg, vec!["un\n", "deux\n", "one\n"]);

        assert_eq!(stats.parallel_corpus.kept, 3);
        assert_eq!(stats.parallel_corpus.filtered, 2);
        assert_eq!(stats.parallel_corpus.visited, 5);
        assert_eq!(stats.datasets[0].description, "a_v1");
        assert_eq!((stats.datasets[0].kept, stats.datasets[0].filtered), (2, 1));
        assert_eq!(stats.datasets[1].description, "b_v1");
        assert_eq!((stats.datasets[1].kept, stats.datasets[1].filtered), (1, 1));
        assert_eq!(stats.final_truncated.kept, 3);
        assert_eq!(stats.final_truncated.visited, 3);
    }

    #[test]
    fn seeded_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let a = dataset(dir.path(), "a_v1", &["1\n", "2\n"], &["un\n", "deux\n"]);
        let seen: WeakStringSet = ["1\nun\n"].into_iter().collect();

        let mut output = ParallelWriter::new(Vec::new(), Vec::new());
        let stats = DeduplicateCorpus::new(vec![a])
            .with_seen(seen)
            .run(&mut output, 1_000, &OutputMode::Stream)
            .unwrap();
        assert_eq!(output.into_inner().0, vec!["2\n"]);
        assert_eq!(stats.parallel_corpus.filtered, 1);
    }

    #[test_log::test]
    fn tabs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = dataset(
            dir.path(),
            "a_v1",
            &["1\n", "with\ttab\n", "3\n"],
            &["un\n", "deux\n", "trois\n"],
        );
        let (src, trg, stats) = run(vec![a], &OutputMode::Truncate { max_lines: 10 });

        let mut pairs: Vec<_> = src.into_iter().zip(trg).collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("1\n".to_string(), "un\n".to_string()),
                ("3\n".to_string(), "trois\n".to_string())
            ]
        );
        // the tab line survives deduplication but not the output
        assert_eq!(stats.parallel_corpus.kept, 3);
        assert_eq!(stats.final_truncated.visited, 3);
        assert_eq!(stats.final_truncated.kept, 2);
        assert_eq!(stats.final_truncated.filtered, 1);
    }

    #[test]
    fn truncate() {
        let dir = tempfile::tempdir().unwrap();
        let src: Vec<String> = (0..100).map(|i| format!("src {}\n", i)).collect();
        let trg: Vec<String> = (0..100).map(|i| format!("trg {}\n", i)).collect();
        let src: Vec<&str> = src.iter().map(|s| s.as_str()).collect();
        let trg: Vec<&str> = trg.iter().map(|s| s.as_str()).collect();
        let a = dataset(dir.path(), "a_v1", &src, &trg);

        let (src, trg, stats) = run(vec![a], &OutputMode::Truncate { max_lines: 10 });
        assert_eq!(src.len(), 10);
        for (src_line, trg_line) in src.iter().zip(&trg) {
            // pairs stay aligned
            assert_eq!(src_line.replace("src", "trg"), *trg_line);
        }
        assert_eq!(stats.final_truncated.visited, 100);
        assert_eq!(stats.final_truncated.kept, 10);
        assert_eq!(stats.final_truncated.filtered, 90);
    }

    #[test]
    fn shuffle() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = tempfile::tempdir().unwrap();
        let src: Vec<String> = (0..100).map(|i| format!("src {}\n", i)).collect();
        let trg: Vec<String> = (0..100).map(|i| format!("trg {}\n", i)).collect();
        let src: Vec<&str> = src.iter().map(|s| s.as_str()).collect();
        let trg: Vec<&str> = trg.iter().map(|s| s.as_str()).collect();
        let a = dataset(dir.path(), "a_v1", &src, &trg);

        let shuffler = crate::processing::external::ChunkedShuffler::new("test", 100, 200)
            .unwrap()
            .chunk_dir(chunks.path());
        let (out_src, out_trg, stats) = run(vec![a], &OutputMode::Shuffle(shuffler));
        assert_eq!(out_src.len(), 100);
        assert_ne!(out_src, src);
        for (src_line, trg_line) in out_src.iter().zip(&out_trg) {
            assert_eq!(src_line.replace("src", "trg"), *trg_line);
        }
        assert_eq!(stats.final_truncated.kept, 100);
    }

    #[test]
    fn line_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dataset(dir.path(), "a_v1", &["1\n", "2\n"], &["un\n"]);
        let mut output = ParallelWriter::new(Vec::new(), Vec::new());
        let res = DeduplicateCorpus::new(vec![a]).run(&mut output, 1_000, &OutputMode::Stream);
        assert!(matches!(res, Err(Error::Custom(_))));
    }

    #[test]
    fn missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = vec![(dir.path().join("a.en.zst"), dir.path().join("a.ru.zst"))];
        let mut output = ParallelWriter::new(Vec::new(), Vec::new());
        let res = DeduplicateCorpus::new(pairs).run(&mut output, 1_000, &OutputMode::Stream);
        assert!(matches!(res, Err(Error::Io(_))));
    }

    #[test]
    fn sample() {
        let dir = tempfile::tempdir().unwrap();
        let (src, trg) = dataset(dir.path(), "corpus", &["a\n", "b\n", "c\n"], &["x\n", "y\n", "z\n"]);
        let sample_path = dir.path().join("corpus.sample.txt");
        sample_corpus(&sample_path, 2, &src, &trg).unwrap();

        let sample = fs::read_to_string(&sample_path).unwrap();
        let sample = sample.strip_prefix('\u{feff}').unwrap();
        let units: Vec<&str> = sample.split_terminator("\n\n").collect();
        assert_eq!(units.len(), 2);
        for unit in units {
            assert!(["a\nx", "b\ny", "c\nz"].contains(&unit), "{:?}", unit);
        }
    }

    #[test]
    fn sample_without_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("corpus.en.txt");
        let trg = dir.path().join("corpus.ru.txt");
        fs::write(&src, "a\nb").unwrap();
        fs::write(&trg, "x\ny").unwrap();
        let sample_path = dir.path().join("corpus.sample.txt");
        sample_corpus(&sample_path, 10, &src, &trg).unwrap();

        let sample = fs::read_to_string(&sample_path).unwrap();
        let mut units: Vec<&str> = sample
            .strip_prefix('\u{feff}')
            .unwrap()
            .split_terminator("\n\n")
            .collect();
        units.sort();
        assert_eq!(units, vec!["a\nx", "b\ny"]);
    }

    #[test]
    fn join() {
        assert_eq!(join_pair("a\n", "b\n").unwrap(), "a\tb\n");
        assert_eq!(join_pair("a\r\n", "b").unwrap(), "a\r\tb");
        assert!(join_pair("a\tb\n", "c\n").is_none());
        assert!(join_pair("a\n", "c\td\n").is_none());
    }
}
