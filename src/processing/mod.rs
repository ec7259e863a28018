/*! Corpus processing

Structures and functions that merge, deduplicate and shuffle line corpora:

- [reservoir]: bounded memory shuffling and sampling,
- [external]: disk backed shuffling of streams of any size,
- [merge] and [mono]: parallel and monolingual corpus merges,
- [datasets]: dataset naming and discovery.
!*/
pub mod datasets;
pub mod external;
pub mod merge;
pub mod mode;
pub mod mono;
mod random;
pub mod reservoir;

pub use external::{shuffle_in_temp_files, ChunkedShuffler, ShuffleReport};
pub use mode::OutputMode;
pub use random::{seeded_rng, SeededRng};
pub use reservoir::{shuffle_with_max_lines, ReservoirSampler, TotalByteSize};
