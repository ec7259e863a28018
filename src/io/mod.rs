/*!
# IO utilities

Line-oriented loading and saving of (possibly compressed) corpus files.
!*/
pub mod reader;
pub mod writer;

pub use reader::{Corpus, LineReader};
pub use writer::{LineWriter, ParallelWriter, WriteLine};
