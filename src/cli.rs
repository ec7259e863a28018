//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

use mtcorpus::error::Error;
use mtcorpus::processing::{ChunkedShuffler, OutputMode, TotalByteSize};

#[derive(Debug, StructOpt)]
#[structopt(name = "mtcorpus", about = "translation corpora merging tool.")]
/// Holds every command that is callable by the `mtcorpus` command.
pub enum Mtcorpus {
    #[structopt(about = "Merge and deduplicate parallel datasets into a single corpus")]
    MergeCorpus(MergeCorpus),
    #[structopt(about = "Merge and deduplicate monolingual datasets, removing lines of the parallel corpus")]
    MergeMono(MergeMono),
    #[structopt(about = "Shuffle a single file")]
    Shuffle(Shuffle),
}

/// Output routing options shared by every command.
#[derive(Debug, StructOpt)]
pub struct ShuffleOpts {
    #[structopt(
        long = "max-lines",
        help = "Maximum number of lines to keep. Lines are sampled uniformly in a single pass."
    )]
    pub max_lines: Option<usize>,
    #[structopt(long = "no-shuffle", help = "Keep input order. Ignored when --max-lines is set.")]
    pub no_shuffle: bool,
    #[structopt(
        long = "chunk-bytes",
        help = "Size of the chunk files used to shuffle out of memory.",
        default_value = "10000000"
    )]
    pub chunk_bytes: u64,
    #[structopt(
        long = "bucket-bytes",
        help = "Amount of data shuffled in memory at once.",
        default_value = "1000000000"
    )]
    pub bucket_bytes: u64,
    #[structopt(
        long = "chunk-dir",
        parse(from_os_str),
        help = "Where chunk files are written. Defaults to the system temporary directory."
    )]
    pub chunk_dir: Option<PathBuf>,
    #[structopt(long = "keep-chunks", help = "Do not delete chunk files.")]
    pub keep_chunks: bool,
}

impl ShuffleOpts {
    pub fn output_mode(&self, seed: &str) -> Result<OutputMode, Error> {
        let mut shuffler = ChunkedShuffler::new(seed, self.chunk_bytes, self.bucket_bytes)?
            .keep_chunks(self.keep_chunks);
        if let Some(chunk_dir) = &self.chunk_dir {
            shuffler = shuffler.chunk_dir(chunk_dir);
        }
        OutputMode::from_options(self.max_lines, self.no_shuffle, shuffler)
    }
}

#[derive(Debug, StructOpt)]
pub struct MergeCorpus {
    #[structopt(long = "src", help = "The source locale")]
    pub src: String,
    #[structopt(long = "trg", help = "The target locale")]
    pub trg: String,
    #[structopt(
        long = "datasets-glob",
        help = "A glob-style path to the parallel datasets, e.g. /path/to/*.zst"
    )]
    pub datasets_glob: String,
    #[structopt(
        long = "artifacts",
        parse(from_os_str),
        help = "The path to the artifacts directory."
    )]
    pub artifacts: PathBuf,
    #[structopt(
        long = "name",
        help = "The final corpus name, e.g. \"corpus\" will output a \"corpus.en.zst\" file."
    )]
    pub name: String,
    #[structopt(
        long = "sample-size",
        help = "Size of the random sample written for review.",
        default_value = "10000"
    )]
    pub sample_size: usize,
    #[structopt(flatten)]
    pub shuffle: ShuffleOpts,
}

#[derive(Debug, StructOpt)]
pub struct MergeMono {
    #[structopt(
        long = "parallel-corpus",
        parse(from_os_str),
        help = "The parallel corpus of this language, e.g. corpus.ca.zst"
    )]
    pub parallel_corpus: PathBuf,
    #[structopt(
        long = "output",
        parse(from_os_str),
        help = "The output file, e.g. artifacts/mono.ca.zst"
    )]
    pub output: PathBuf,
    #[structopt(
        long = "datasets-glob",
        help = "A glob-style path to the mono datasets, e.g. /path/to/*.zst"
    )]
    pub datasets_glob: String,
    #[structopt(
        long = "sample-size",
        help = "Size of the random sample written for review.",
        default_value = "10000"
    )]
    pub sample_size: usize,
    #[structopt(flatten)]
    pub shuffle: ShuffleOpts,
}

#[derive(Debug, StructOpt)]
pub struct Shuffle {
    #[structopt(parse(from_os_str), help = "input file (plain, .gz or .zst)")]
    pub input: PathBuf,
    #[structopt(parse(from_os_str), help = "output file (plain, .gz or .zst)")]
    pub output: PathBuf,
    #[structopt(long = "seed", help = "Random seed", default_value = "mtcorpus")]
    pub seed: String,
    #[structopt(
        long = "total-bytes",
        help = "Byte size of the decompressed input, used with --max-lines. Defaults to the input file size."
    )]
    pub total_bytes: Option<u64>,
    #[structopt(
        long = "estimated-lines",
        help = "Approximate number of lines of the input, used with --max-lines instead of --total-bytes."
    )]
    pub estimated_lines: Option<u64>,
    #[structopt(flatten)]
    pub shuffle: ShuffleOpts,
}

impl Shuffle {
    /// Byte size of the input as given on the command line, or its on-disk size.
    pub fn total_byte_size(&self) -> Result<TotalByteSize, Error> {
        if self.total_bytes.is_none() && self.estimated_lines.is_none() {
            return Ok(TotalByteSize::Known(std::fs::metadata(&self.input)?.len()));
        }
        let estimate = self.estimated_lines.map(|lines| {
            Box::new(move |average_bytes_per_line: f64| (average_bytes_per_line * lines as f64) as u64)
                as Box<dyn Fn(f64) -> u64>
        });
        TotalByteSize::from_options(self.total_bytes, estimate)
    }
}
