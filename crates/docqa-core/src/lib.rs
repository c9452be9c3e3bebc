//! docqa-core
//!
//! Domain types, the error taxonomy, capability traits and configuration shared
//! by every docqa crate, plus the offline front half of the pipeline: the
//! document loader and the chunker.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
#[cfg(feature = "test-util")]
pub mod testing;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, Document, Provenance, QueryResult, ScoredChunk};
