//! Exact inner-product vector index
//!
//! Vectors are stored row-major in one contiguous buffer. Search scores every
//! row; with unit vectors the inner product is the cosine similarity. This
//! index never normalizes anything itself.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Dense 0-based position shared by a vector and its fragment
pub type RowId = usize;

/// Append-only vector collection with exact top-k search.
///
/// `search` returns scores in strictly descending order with ties broken by
/// the lower row id, all rows when fewer than `top_k` are stored, and nothing
/// for an empty index.
pub trait VectorIndex {
    /// Dimensionality, fixed by the first insert
    fn dim(&self) -> Option<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `vectors` in order and return their row ids. A batch with any
    /// vector of the wrong length inserts nothing.
    fn insert_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<RowId>>;

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(RowId, f32)>>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dim: Option<usize>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored vectors in row order
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        // dim is never 0 once set
        self.data.chunks_exact(self.dim.unwrap_or(1))
    }
}

impl VectorIndex for FlatIndex {
    fn dim(&self) -> Option<usize> {
        self.dim
    }

    fn len(&self) -> usize {
        match self.dim {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    fn insert_batch(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<RowId>> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };

        let dim = match self.dim {
            Some(dim) => dim,
            None if first.is_empty() => {
                return Err(Error::InvalidParameter(
                    "cannot index zero-length vectors".to_string(),
                ))
            }
            None => first.len(),
        };

        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        let start = self.len();
        self.dim = Some(dim);
        self.data.reserve(vectors.len() * dim);
        for v in vectors {
            self.data.extend_from_slice(v);
        }

        Ok((start..start + vectors.len()).collect())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(RowId, f32)>> {
        let Some(dim) = self.dim else {
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Err(Error::InvalidParameter(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if query.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(RowId, f32)> = self
            .data
            .chunks_exact(dim)
            .map(|v| dot(query, v))
            .enumerate()
            .collect();

        if top_k < scored.len() {
            scored.select_nth_unstable_by(top_k - 1, rank_order);
            scored.truncate(top_k);
        }
        scored.sort_by(rank_order);

        Ok(scored)
    }
}

/// Descending score, then ascending row id. `+ 0.0` folds -0.0 into 0.0 so
/// signed zeros tie.
fn rank_order(a: &(RowId, f32), b: &(RowId, f32)) -> Ordering {
    (b.1 + 0.0).total_cmp(&(a.1 + 0.0)).then(a.0.cmp(&b.0))
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
