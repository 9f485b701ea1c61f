//! Full rebuild of a collection
//!
//! Documents are visited in name order, chunked, embedded and only then
//! written. Any failure before the final write leaves the previously
//! persisted collection untouched.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::chunker::Chunker;
use super::collection::{save_collection, Collection, CollectionInfo};
use super::embedding::Embedder;
use super::store::Fragment;
use crate::core::config::Config;
use crate::core::document::{collect_documents, Document, Extractor};
use crate::error::{Error, Result};

/// Statistics of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub documents: usize,
    /// Documents without any words
    pub skipped: usize,
    pub fragments: usize,
    pub dim: usize,
    pub path: PathBuf,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Built(BuildStats),
    /// No document produced a fragment; nothing was written
    Empty { documents: usize, skipped: usize },
}

/// Fragments gathered so far, in global visitation order
#[derive(Default)]
struct Gathered {
    documents: usize,
    skipped: usize,
    fragments: Vec<Fragment>,
}

impl Gathered {
    fn add(&mut self, chunker: &Chunker, document: Document) {
        self.documents += 1;
        if document.is_blank() {
            warn!(document = %document.name, "skipping document without text");
            self.skipped += 1;
            return;
        }

        let chunks = chunker.chunk(&document.raw_text);
        debug!(document = %document.name, chunks = chunks.len(), "chunked");
        for (chunk_index, text) in chunks.into_iter().enumerate() {
            self.fragments.push(Fragment {
                source: document.name.clone(),
                chunk_index,
                text,
            });
        }
    }
}

pub struct IndexBuilder<'a> {
    config: &'a Config,
    chunker: Chunker,
    extractor: &'a dyn Extractor,
    embedder: &'a dyn Embedder,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a Config, extractor: &'a dyn Extractor, embedder: &'a dyn Embedder) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.overlap)?;

        Ok(Self {
            config,
            chunker,
            extractor,
            embedder,
        })
    }

    /// Rebuild from the configured source folder
    pub fn build(&self) -> Result<BuildOutcome> {
        let start = Instant::now();
        let files = collect_documents(&self.config.source_dir, &self.config.include)?;
        info!(
            source = %self.config.source_dir.display(),
            files = files.len(),
            "building collection"
        );

        let mut gathered = Gathered::default();
        for file in &files {
            let raw_text = self.extractor.extract(&file.path)?;
            gathered.add(&self.chunker, Document::new(file.name.clone(), raw_text));
        }

        self.finish(gathered, start)
    }

    /// Rebuild from documents already extracted; they are visited by name
    pub fn build_from_documents(&self, documents: Vec<Document>) -> Result<BuildOutcome> {
        let start = Instant::now();
        let gathered = self.gather(documents);
        self.finish(gathered, start)
    }

    fn gather(&self, mut documents: Vec<Document>) -> Gathered {
        documents.sort_by(|a, b| a.name.cmp(&b.name));

        let mut gathered = Gathered::default();
        for document in documents {
            gathered.add(&self.chunker, document);
        }
        gathered
    }

    fn finish(&self, gathered: Gathered, start: Instant) -> Result<BuildOutcome> {
        if gathered.fragments.is_empty() {
            info!(documents = gathered.documents, "nothing to index");
            return Ok(BuildOutcome::Empty {
                documents: gathered.documents,
                skipped: gathered.skipped,
            });
        }

        let collection = self.assemble(&gathered.fragments)?;
        let path = self.config.collection_path();
        save_collection(&path, &collection)?;

        let stats = BuildStats {
            documents: gathered.documents,
            skipped: gathered.skipped,
            fragments: collection.len(),
            dim: collection.dim().unwrap_or_default(),
            path,
            duration_ms: start.elapsed().as_millis(),
        };
        info!(
            fragments = stats.fragments,
            documents = stats.documents,
            duration_ms = stats.duration_ms as u64,
            "collection built"
        );
        Ok(BuildOutcome::Built(stats))
    }

    fn assemble(&self, fragments: &[Fragment]) -> Result<Collection> {
        let vectors = self.embed_all(fragments)?;

        let mut collection = Collection::new(CollectionInfo {
            embedder_id: self.embedder.embedder_id().to_string(),
            chunk_size: self.chunker.size(),
            overlap: self.chunker.overlap(),
            preview_max_chars: self.config.preview_max_chars,
            built_at: chrono::Utc::now().timestamp(),
        });
        collection.append_batch(fragments, &vectors)?;
        Ok(collection)
    }

    fn embed_all(&self, fragments: &[Fragment]) -> Result<Vec<Vec<f32>>> {
        info!(fragments = fragments.len(), embedder = self.embedder.embedder_id(), "embedding");

        let expected_dim = self.embedder.dim();
        let mut vectors = Vec::with_capacity(fragments.len());
        for (n, batch) in fragments.chunks(self.config.embed_batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts)?;

            if embedded.len() != texts.len() {
                return Err(Error::EmbeddingUnavailable(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != expected_dim) {
                return Err(Error::DimensionMismatch {
                    expected: expected_dim,
                    actual: bad.len(),
                });
            }

            debug!(batch = n, size = texts.len(), "embedded batch");
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::collection::CollectionDb;
    use crate::search::index::VectorIndex;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One-hot on the length of the first word, for predictable vectors
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        fn embedder_id(&self) -> &str {
            "stub:d4"
        }

        fn dim(&self) -> usize {
            4
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; 4];
                    v[t.split_whitespace().next().map_or(0, str::len) % 4] = 1.0;
                    v
                })
                .collect())
        }
    }

    /// Fails on the n-th call
    struct FlakyEmbedder {
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl Embedder for FlakyEmbedder {
        fn embedder_id(&self) -> &str {
            "flaky:d4"
        }

        fn dim(&self) -> usize {
            4
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_on {
                return Err(Error::EmbeddingUnavailable("provider offline".to_string()));
            }
            StubEmbedder.embed_batch(texts)
        }
    }

    struct NoExtractor;

    impl Extractor for NoExtractor {
        fn extract(&self, path: &Path) -> Result<String> {
            Err(Error::UnreadableDocument {
                path: path.to_path_buf(),
                reason: "unused".to_string(),
            })
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn config(root: &Path) -> Config {
        Config {
            embed_batch_size: 2,
            ..Config::default()
        }
        .resolved(root)
    }

    #[test]
    fn test_two_documents_scenario() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config(dir.path());
        let builder = IndexBuilder::new(&config, &NoExtractor, &StubEmbedder)?;

        let outcome = builder.build_from_documents(vec![
            Document::new("doc2", ""),
            Document::new("doc1", words(801)),
        ])?;

        let BuildOutcome::Built(stats) = outcome else {
            panic!("expected a built collection");
        };
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.fragments, 2);
        assert_eq!(stats.dim, 4);

        let collection = CollectionDb::open(&config.collection_path())?.load()?;
        assert_eq!(collection.index().len(), collection.store().len());
        let first = collection.store().get(0)?;
        let second = collection.store().get(1)?;
        assert_eq!((first.source.as_str(), first.chunk_index), ("doc1", 0));
        assert_eq!((second.source.as_str(), second.chunk_index), ("doc1", 1));
        assert!(second.preview.starts_with("w700 "));
        Ok(())
    }

    #[test]
    fn test_order_follows_document_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config {
            chunk_size: 2,
            overlap: 0,
            ..config(dir.path())
        };
        let builder = IndexBuilder::new(&config, &NoExtractor, &StubEmbedder)?;

        builder.build_from_documents(vec![
            Document::new("b", "b0 b1 b2"),
            Document::new("a", "a0 a1"),
        ])?;
        let collection = CollectionDb::open(&config.collection_path())?.load()?;

        let rows: Vec<(String, usize)> = collection
            .store()
            .iter()
            .map(|f| (f.source.clone(), f.chunk_index))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), 0),
                ("b".to_string(), 0),
                ("b".to_string(), 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_nothing_to_index_writes_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config(dir.path());
        let builder = IndexBuilder::new(&config, &NoExtractor, &StubEmbedder)?;

        let outcome = builder.build_from_documents(vec![
            Document::new("a", " \n "),
            Document::new("b", ""),
        ])?;

        assert!(matches!(outcome, BuildOutcome::Empty { documents: 2, skipped: 2 }));
        assert!(!config.collection_path().exists());
        Ok(())
    }

    #[test]
    fn test_embedding_failure_keeps_previous_collection() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = config(dir.path());

        IndexBuilder::new(&config, &NoExtractor, &StubEmbedder)?
            .build_from_documents(vec![Document::new("old", "one two three")])?;

        // batch size 2 and five fragments: the second call fails mid-build
        let flaky = FlakyEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: 1,
        };
        let small = Config {
            chunk_size: 1,
            overlap: 0,
            ..config.clone()
        };
        let result = IndexBuilder::new(&small, &NoExtractor, &flaky)?
            .build_from_documents(vec![Document::new("new", "a b c d e")]);
        assert!(matches!(result, Err(Error::EmbeddingUnavailable(_))));

        let collection = CollectionDb::open(&config.collection_path())?.load()?;
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.store().get(0)?.source, "old");
        Ok(())
    }

    #[test]
    fn test_short_provider_response_is_rejected() -> Result<()> {
        struct Short;
        impl Embedder for Short {
            fn embedder_id(&self) -> &str {
                "short"
            }
            fn dim(&self) -> usize {
                2
            }
            fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(vec![vec![1.0, 0.0]])
            }
        }

        let dir = tempfile::tempdir()?;
        let config = config(dir.path());
        let result = IndexBuilder::new(&config, &NoExtractor, &Short)?
            .build_from_documents(vec![Document::new("a", "x"), Document::new("b", "y")]);
        assert!(matches!(result, Err(Error::EmbeddingUnavailable(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            chunk_size: 100,
            overlap: 100,
            ..Config::default()
        };
        assert!(IndexBuilder::new(&config, &NoExtractor, &StubEmbedder).is_err());
    }
}
