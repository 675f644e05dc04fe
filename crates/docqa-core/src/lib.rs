#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod filter;
pub mod records;
pub mod traits;
pub mod types;

pub use error::{EmbeddingError, Error, Result};
pub use filter::Filter;
pub use types::{Chunk, ChunkId, ChunkRecord, EMBEDDING_DIM};
