//! docqa-rag
//!
//! The online and offline halves of the question-answering pipeline:
//! `ingest` turns a directory of documents into a persisted index, and
//! `RagPipeline` answers questions against it.

pub mod ingest;
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;

pub use ingest::{ingest, IngestReport};
pub use pipeline::{shared_pipeline, PipelineOptions, RagPipeline};
pub use retriever::Retriever;
pub use synthesizer::{build_prompt, AnswerSynthesizer, DEFAULT_TEMPERATURE};
