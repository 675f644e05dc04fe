//! docqa-hybrid
//!
//! Query path: dense and lexical channels in parallel, weighted RRF fusion,
//! composite rerank. Also the ingestion pipeline, the chat-backed answer
//! and summary helpers built on top of retrieval, and a recall evaluation
//! harness.

pub mod answer;
pub mod evaluate;
pub mod expand;
pub mod fusion;
pub mod ingest;
pub mod rerank;
pub mod retriever;

pub use answer::{Answer, Answerer, SourceRef, NOTHING_FOUND};
pub use evaluate::{DatasetMode, EvalCase, EvalReport, Evaluator};
pub use expand::QueryExpander;
pub use fusion::{fuse, CandidateKey, FusionWeights, RetrievalCandidate};
pub use ingest::{IngestFailure, IngestReport, Ingestor};
pub use rerank::{partial_ratio, RankedCandidate, Reranker, ScoreBreakdown};
pub use retriever::{HybridRetriever, RetrievalResponse, RetrieverOptions};
