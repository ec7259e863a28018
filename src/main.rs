//! # mtcorpus
//!
//! Merges, deduplicates and shuffles machine translation corpora.
//!
//! ```sh
//! mtcorpus 0.1.0
//! translation corpora merging tool.
//!
//! USAGE:
//!     mtcorpus <SUBCOMMAND>
//!
//! FLAGS:
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!
//! SUBCOMMANDS:
//!     help            Prints this message or the help of the given subcommand(s)
//!     merge-corpus    Merge and deduplicate parallel datasets into a single corpus
//!     merge-mono      Merge and deduplicate monolingual datasets, removing lines of the parallel corpus
//!     shuffle         Shuffle a single file
//! ```
use structopt::StructOpt;

use mtcorpus::error::Error;
use mtcorpus::processing::{merge, mode, mono};

#[macro_use]
extern crate log;

mod cli;

fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = cli::Mtcorpus::from_args();
    debug!("cli args\n{:#?}", opt);

    match opt {
        cli::Mtcorpus::MergeCorpus(m) => {
            let mode = m.shuffle.output_mode(merge::CORPUS_SEED)?;
            let merge = merge::MergeCorpus {
                src: m.src,
                trg: m.trg,
                datasets_glob: m.datasets_glob,
                artifacts: m.artifacts,
                name: m.name,
                sample_size: m.sample_size,
                mode,
            };
            merge.run()?;
            info!("Done: Merging parallel datasets");
        }
        cli::Mtcorpus::MergeMono(m) => {
            let mode = m.shuffle.output_mode(mono::MONO_SEED)?;
            let merge = mono::MergeMono {
                parallel_corpus: m.parallel_corpus,
                output: m.output,
                datasets_glob: m.datasets_glob,
                sample_size: m.sample_size,
                mode,
            };
            merge.run()?;
            info!("Done: Merging monolingual datasets");
        }
        cli::Mtcorpus::Shuffle(s) => {
            let total_byte_size = s.total_byte_size()?;
            let mode = s.shuffle.output_mode(&s.seed)?;
            mode::shuffle_file(&s.input, &s.output, &s.seed, &mode, total_byte_size)?;
        }
    };
    Ok(())
}
