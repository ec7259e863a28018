/*! # mtcorpus

Merging, deduplication and shuffling of machine translation training corpora.

Corpora are plain (optionally gzip/zstd compressed) text files with one sentence per line.
Parallel corpora are pairs of such files, aligned line by line.
!*/
pub mod error;
pub mod filtering;
pub mod io;
pub mod processing;
pub mod progress;
pub mod stats;
