/*!
# Line writing

- [LineWriter] writes a single (possibly compressed) file.
- [ParallelWriter] splits tab-joined sentence pairs into two files.
- [ChunkWriter] partitions a stream into size-bounded `chunk.N` files, creating a new file when a limit is reached.

All of them implement [WriteLine].
!*/
mod chunkwriter;
mod linewriter;
mod writertrait;
pub use chunkwriter::{chunk_path, ChunkWriter};
pub use linewriter::{LineWriter, ParallelWriter};
pub use writertrait::WriteLine;
