use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use docqa_core::EMBEDDING_DIM;

pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

/// Scalar columns returned by scans and searches; the vector is never read back.
pub const CHUNK_COLUMNS: [&str; 5] = ["id", "filename", "page", "chunk_id", "content"];

pub fn vector_dim() -> i32 {
	i32::try_from(EMBEDDING_DIM).unwrap_or(i32::MAX)
}

pub fn build_chunk_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Int64, false),
		Field::new("filename", DataType::Utf8, false),
		Field::new("page", DataType::Int64, false),
		Field::new("chunk_id", DataType::Int64, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim()), true),
	]))
}
