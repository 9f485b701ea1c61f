//! Fragment metadata aligned with the vector index
//!
//! Row `i` of the store describes row `i` of the index. Appends happen in the
//! same order as `insert_batch`, so a search hit joins back to its fragment
//! by position alone.

use serde::{Deserialize, Serialize};

use super::index::RowId;
use crate::error::{Error, Result};

/// A chunk of one document, the unit of indexing and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub source: String,
    /// 0-based position within the source document's chunks
    pub chunk_index: usize,
    pub text: String,
}

impl Fragment {
    pub fn meta(&self) -> FragmentMeta {
        FragmentMeta {
            source: self.source.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Provenance of one fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    pub source: String,
    pub chunk_index: usize,
}

/// Fragment as persisted: provenance plus a bounded preview of its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFragment {
    pub source: String,
    pub chunk_index: usize,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentStore {
    fragments: Vec<StoredFragment>,
    preview_max_chars: usize,
}

impl FragmentStore {
    /// Previews are cut to `preview_max_chars` characters (Unicode scalar
    /// values, never bytes).
    pub fn new(preview_max_chars: usize) -> Self {
        Self {
            fragments: Vec::new(),
            preview_max_chars,
        }
    }

    /// Rebuild from fragments already truncated, e.g. when loading
    pub fn from_stored(fragments: Vec<StoredFragment>, preview_max_chars: usize) -> Self {
        Self {
            fragments,
            preview_max_chars,
        }
    }

    /// Append one fragment and return its row id
    pub fn append(&mut self, meta: FragmentMeta, text: &str) -> RowId {
        let row = self.fragments.len();
        self.fragments.push(StoredFragment {
            source: meta.source,
            chunk_index: meta.chunk_index,
            preview: truncate_chars(text, self.preview_max_chars).to_string(),
        });
        row
    }

    pub fn get(&self, row_id: RowId) -> Result<&StoredFragment> {
        self.fragments.get(row_id).ok_or(Error::NotFound {
            row_id,
            len: self.fragments.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredFragment> {
        self.fragments.iter()
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
