//! docqa-vector
//!
//! Chunk persistence and the dense retrieval channel:
//! - `lance`: LanceDB table with staged writes and exact L2 search
//! - `memory`: in-process store with identical semantics
//! - `dense`: query embedding plus nearest-neighbour search
//! - `recall`: top-1 self-recall check over a random sample

pub mod dense;
pub mod lance;
pub mod memory;
pub mod recall;
pub mod schema;
mod staging;
pub mod table;

pub use dense::DenseSearch;
pub use lance::LanceChunkStore;
pub use memory::MemoryChunkStore;
pub use recall::{self_recall, RecallReport};
