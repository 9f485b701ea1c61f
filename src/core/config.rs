//! Collection configuration
//!
//! Loaded from an optional `corpus.yaml` at the project root. Every field has
//! a default, so a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "corpus.yaml";

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_OVERLAP: usize = 100;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder scanned for documents
    pub source_dir: PathBuf,
    /// Folder holding `<collection>.db`
    pub storage_dir: PathBuf,
    pub collection: String,
    /// Words per fragment
    pub chunk_size: usize,
    /// Words shared with the preceding fragment
    pub overlap: usize,
    pub top_k: usize,
    /// Texts per embedding provider call
    pub embed_batch_size: usize,
    /// Stored preview length, in characters
    pub preview_max_chars: usize,
    /// File name globs selecting documents
    pub include: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("Source"),
            storage_dir: PathBuf::from("artifacts"),
            collection: "default".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_batch_size: 64,
            preview_max_chars: DEFAULT_PREVIEW_MAX_CHARS,
            include: ["*.txt", "*.md", "*.pdf", "*.docx"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load `corpus.yaml` from `root` (defaults when absent) and resolve
    /// relative directories against `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let config = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Self::default()
            } else {
                serde_yaml::from_str(&raw)?
            }
        } else {
            Self::default()
        };

        let config = config.resolved(root);
        config.validate()?;
        Ok(config)
    }

    /// Anchor relative `source_dir` and `storage_dir` at `root`.
    pub fn resolved(mut self, root: &Path) -> Self {
        if self.source_dir.is_relative() {
            self.source_dir = root.join(&self.source_dir);
        }
        if self.storage_dir.is_relative() {
            self.storage_dir = root.join(&self.storage_dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be greater than 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(invalid(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be greater than 0"));
        }
        if self.embed_batch_size == 0 {
            return Err(invalid("embed_batch_size must be greater than 0"));
        }
        if self.preview_max_chars == 0 {
            return Err(invalid("preview_max_chars must be greater than 0"));
        }
        if self.collection.is_empty()
            || self.collection.contains(['/', '\\'])
            || self.collection.starts_with('.')
        {
            return Err(invalid(format!(
                "invalid collection name '{}'",
                self.collection
            )));
        }
        Ok(())
    }

    /// Database file holding the named collection
    pub fn collection_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.db", self.collection))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidParameter(msg.into())
}
