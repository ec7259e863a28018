/*! Filtering utilities

Filters operate on single lines.

Filters implement [Filter], [FilterMut] or both:
- [Filter] is implemented for filters that do not have state (see [MaxWords] for example)
- [FilterMut] is implemented for filters that do have state (see [WeakStringSet], which remembers every line it has seen).
!*/
mod dedup;
mod filter;
mod sentence;

pub use dedup::{collision_probability, hash_line, LineHash, WeakStringSet};
pub use filter::Filter;
pub use filter::FilterMut;
pub use sentence::MaxWords;
