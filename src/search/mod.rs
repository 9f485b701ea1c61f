//! Semantic retrieval core
//!
//! Documents are chunked, embedded and stored in a flat inner-product index
//! alongside their fragment metadata. A collection is built wholesale and
//! queried read-only.

pub mod builder;
pub mod chunker;
pub mod collection;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod store;

pub use builder::{BuildOutcome, BuildStats, IndexBuilder};
pub use chunker::Chunker;
pub use collection::{save_collection, Collection, CollectionDb, CollectionInfo, CollectionStats};
pub use embedding::{Embedder, HtpEmbedder};
pub use engine::{QueryEngine, SearchHit};
pub use index::{FlatIndex, RowId, VectorIndex};
pub use store::{Fragment, FragmentMeta, FragmentStore, StoredFragment};
