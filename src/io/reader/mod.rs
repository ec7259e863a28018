/*! Corpus reading utilities

- [LineReader] reads a single (possibly compressed) file line by line.
- [Corpus] chains several files into one stream.
!*/
pub mod corpus;
mod textreader;

pub use corpus::Corpus;
pub use textreader::{Compression, LineReader};
