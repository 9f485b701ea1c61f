//! Query Engine - embeds a query and searches a persisted collection

use serde::Serialize;
use tracing::debug;

use super::collection::{Collection, CollectionDb};
use super::embedding::Embedder;
use super::index::VectorIndex;
use super::store::StoredFragment;
use crate::core::config::Config;
use crate::error::{Error, Result};

/// One ranked fragment; rank is its position in the result list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub row_id: usize,
    #[serde(flatten)]
    pub fragment: StoredFragment,
    pub score: f32,
}

pub struct QueryEngine<'a> {
    collection: Collection,
    embedder: &'a dyn Embedder,
    default_top_k: usize,
}

impl<'a> QueryEngine<'a> {
    /// Load the configured collection.
    ///
    /// The collection must have been built by the same embedder, otherwise
    /// scores would compare unrelated vector spaces.
    pub fn open(config: &Config, embedder: &'a dyn Embedder) -> Result<Self> {
        let db = CollectionDb::open(&config.collection_path())?;
        let collection = db.load()?;

        let built_with = &collection.info().embedder_id;
        if built_with != embedder.embedder_id() {
            return Err(Error::InvalidParameter(format!(
                "collection was built with '{}' but the query embedder is '{}'",
                built_with,
                embedder.embedder_id()
            )));
        }

        let mut engine = Self::from_collection(collection, embedder)?;
        engine.default_top_k = config.top_k;
        Ok(engine)
    }

    /// Query an in-memory collection
    pub fn from_collection(collection: Collection, embedder: &'a dyn Embedder) -> Result<Self> {
        if let Some(dim) = collection.dim() {
            if dim != embedder.dim() {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: embedder.dim(),
                });
            }
        }

        Ok(Self {
            collection,
            embedder,
            default_top_k: crate::core::config::DEFAULT_TOP_K,
        })
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Up to `top_k` fragments by descending similarity
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(Error::InvalidParameter(
                "top_k must be greater than 0".to_string(),
            ));
        }

        let mut embedded = self.embedder.embed_batch(&[text.to_string()])?;
        if embedded.len() != 1 {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider returned {} vectors for 1 query",
                embedded.len()
            )));
        }
        let query_vector = embedded.remove(0);

        let ranked = self.collection.index().search(&query_vector, top_k)?;
        debug!(top_k, hits = ranked.len(), "searched collection");

        ranked
            .into_iter()
            .map(|(row_id, score)| {
                Ok(SearchHit {
                    row_id,
                    fragment: self.collection.store().get(row_id)?.clone(),
                    score,
                })
            })
            .collect()
    }

    pub fn query_default(&self, text: &str) -> Result<Vec<SearchHit>> {
        self.query(text, self.default_top_k)
    }
}
