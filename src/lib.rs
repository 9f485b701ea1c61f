//! corpus-search library
//!
//! Build a searchable collection from a folder of documents and answer
//! natural-language queries with the most similar text fragments.
//!
//! # Modules
//!
//! - `core`: Configuration and document discovery/extraction
//! - `search`: Chunking, embedding, vector index and query engine
//! - `mcp`: MCP server exposing the query engine (feature `mcp`)

pub mod core;
pub mod error;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::Config;
pub use crate::core::document::{collect_documents, Document, Extractor, FileExtractor};
pub use error::{Error, Result};
pub use search::{IndexBuilder, QueryEngine, SearchHit};
