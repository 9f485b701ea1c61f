//! Persisted collections
//!
//! One SQLite file per collection holds two aligned artifacts: `vectors`
//! (little-endian f32 BLOBs) and `fragments` (source, chunk index, preview),
//! both keyed by the shared row id, plus a small `collection_meta` table.
//! A rebuild writes a complete new file next to the old one and renames it
//! into place, so readers see either the old collection or the new one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::index::{FlatIndex, RowId, VectorIndex};
use super::store::{Fragment, FragmentStore, StoredFragment};
use crate::error::{Error, Result};

const FORMAT_VERSION: &str = "1";

/// Build parameters recorded with a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub embedder_id: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub preview_max_chars: usize,
    /// Unix timestamp (seconds)
    pub built_at: i64,
}

/// Vector index and fragment store with identical row order
#[derive(Debug, Clone)]
pub struct Collection {
    index: FlatIndex,
    store: FragmentStore,
    info: CollectionInfo,
}

impl Collection {
    pub fn new(info: CollectionInfo) -> Self {
        Self {
            index: FlatIndex::new(),
            store: FragmentStore::new(info.preview_max_chars),
            info,
        }
    }

    /// Add fragments with their vectors, index first, then store, same order.
    pub fn append_batch(&mut self, fragments: &[Fragment], vectors: &[Vec<f32>]) -> Result<Vec<RowId>> {
        if fragments.len() != vectors.len() {
            return Err(Error::InvalidParameter(format!(
                "{} fragments but {} vectors",
                fragments.len(),
                vectors.len()
            )));
        }

        let rows = self.index.insert_batch(vectors)?;
        for (row, fragment) in rows.iter().zip(fragments) {
            let stored = self.store.append(fragment.meta(), &fragment.text);
            debug_assert_eq!(*row, stored);
        }
        Ok(rows)
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn store(&self) -> &FragmentStore {
        &self.store
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.index.dim()
    }
}

/// Summary of a persisted collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub path: PathBuf,
    pub fragment_count: usize,
    pub vector_count: usize,
    pub dim: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub embedder_id: String,
    pub built_at: i64,
    pub file_size_bytes: u64,
}

/// Read-only handle on a persisted collection
pub struct CollectionDb {
    conn: Connection,
    path: PathBuf,
}

impl CollectionDb {
    /// Open an existing collection file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::CollectionNotFound {
                name: collection_name(path),
                path: path.to_path_buf(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Load both artifacts and verify they line up
    pub fn load(&self) -> Result<Collection> {
        let meta = self.read_meta()?;
        let dim: usize = required(&meta, "dim")?;
        let count: usize = required(&meta, "count")?;
        let info = info_from_meta(&meta)?;

        let mut vectors = Vec::with_capacity(count);
        {
            let mut stmt = self
                .conn
                .prepare("SELECT row_id, embedding FROM vectors ORDER BY row_id")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))?;
            for (expected, row) in rows.enumerate() {
                let (row_id, blob) = row?;
                check_row_id(row_id, expected, "vectors")?;
                if blob.len() != dim * 4 {
                    return Err(Error::CorruptCollection(format!(
                        "vector {} has {} bytes, expected {}",
                        row_id,
                        blob.len(),
                        dim * 4
                    )));
                }
                vectors.push(blob_to_embedding(&blob));
            }
        }

        let mut fragments = Vec::with_capacity(count);
        {
            let mut stmt = self
                .conn
                .prepare("SELECT row_id, source, chunk_index, preview FROM fragments ORDER BY row_id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    StoredFragment {
                        source: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        preview: row.get(3)?,
                    },
                ))
            })?;
            for (expected, row) in rows.enumerate() {
                let (row_id, fragment) = row?;
                check_row_id(row_id, expected, "fragments")?;
                fragments.push(fragment);
            }
        }

        if vectors.len() != count || fragments.len() != count {
            return Err(Error::CorruptCollection(format!(
                "expected {} rows, found {} vectors and {} fragments",
                count,
                vectors.len(),
                fragments.len()
            )));
        }

        let mut index = FlatIndex::new();
        index.insert_batch(&vectors)?;

        debug!(path = %self.path.display(), rows = count, dim, "loaded collection");
        Ok(Collection {
            index,
            store: FragmentStore::from_stored(fragments, info.preview_max_chars),
            info,
        })
    }

    /// Fetch one fragment without loading the vectors
    pub fn get_fragment(&self, row_id: RowId) -> Result<StoredFragment> {
        let found = self
            .conn
            .query_row(
                "SELECT source, chunk_index, preview FROM fragments WHERE row_id = ?1",
                params![row_id as i64],
                |row| {
                    Ok(StoredFragment {
                        source: row.get(0)?,
                        chunk_index: row.get::<_, i64>(1)? as usize,
                        preview: row.get(2)?,
                    })
                },
            )
            .optional()?;

        match found {
            Some(fragment) => Ok(fragment),
            None => Err(Error::NotFound {
                row_id,
                len: self.count("fragments")?,
            }),
        }
    }

    pub fn stats(&self) -> Result<CollectionStats> {
        let meta = self.read_meta()?;
        let info = info_from_meta(&meta)?;
        let file_size_bytes = fs::metadata(&self.path)?.len();

        Ok(CollectionStats {
            path: self.path.clone(),
            fragment_count: self.count("fragments")?,
            vector_count: self.count("vectors")?,
            dim: required(&meta, "dim")?,
            chunk_size: info.chunk_size,
            overlap: info.overlap,
            embedder_id: info.embedder_id,
            built_at: info.built_at,
            file_size_bytes,
        })
    }

    fn count(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn read_meta(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM collection_meta")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut meta = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            meta.insert(key, value);
        }

        match meta.get("format_version") {
            Some(v) if v == FORMAT_VERSION => Ok(meta),
            Some(v) => Err(Error::CorruptCollection(format!("unsupported format version {}", v))),
            None => Err(Error::CorruptCollection("missing format_version".to_string())),
        }
    }
}

/// Write `collection` to `path`, replacing any previous collection there.
///
/// Everything goes into `<path>.tmp` inside one transaction; the file is
/// renamed over `path` only after the commit succeeded.
pub fn save_collection(path: &Path, collection: &Collection) -> Result<()> {
    let Some(dim) = collection.dim() else {
        return Err(Error::InvalidParameter(
            "refusing to persist an empty collection".to_string(),
        ));
    };
    if collection.index.len() != collection.store.len() {
        return Err(Error::CorruptCollection(format!(
            "{} vectors but {} fragments",
            collection.index.len(),
            collection.store.len()
        )));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    if tmp.exists() {
        fs::remove_file(&tmp)?;
    }

    if let Err(e) = write_db(&tmp, collection, dim) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), rows = collection.len(), dim, "saved collection");
    Ok(())
}

fn write_db(path: &Path, collection: &Collection, dim: usize) -> Result<()> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE collection_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- row_id is shared with fragments
        CREATE TABLE vectors (
            row_id INTEGER PRIMARY KEY,
            embedding BLOB NOT NULL
        );

        CREATE TABLE fragments (
            row_id INTEGER PRIMARY KEY,
            source TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            preview TEXT NOT NULL
        );
        "#,
    )?;

    let info = &collection.info;
    let tx = conn.transaction()?;
    {
        let mut meta = tx.prepare("INSERT INTO collection_meta (key, value) VALUES (?1, ?2)")?;
        for (key, value) in [
            ("format_version", FORMAT_VERSION.to_string()),
            ("dim", dim.to_string()),
            ("count", collection.len().to_string()),
            ("embedder_id", info.embedder_id.clone()),
            ("chunk_size", info.chunk_size.to_string()),
            ("overlap", info.overlap.to_string()),
            ("preview_max_chars", info.preview_max_chars.to_string()),
            ("built_at", info.built_at.to_string()),
        ] {
            meta.execute(params![key, value])?;
        }

        let mut insert_vector = tx.prepare("INSERT INTO vectors (row_id, embedding) VALUES (?1, ?2)")?;
        for (row, vector) in collection.index.vectors().enumerate() {
            insert_vector.execute(params![row as i64, embedding_to_blob(vector)])?;
        }

        let mut insert_fragment = tx.prepare(
            "INSERT INTO fragments (row_id, source, chunk_index, preview) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (row, fragment) in collection.store.iter().enumerate() {
            insert_fragment.execute(params![
                row as i64,
                fragment.source,
                fragment.chunk_index as i64,
                fragment.preview,
            ])?;
        }
    }
    tx.commit()?;
    conn.close().map_err(|(_, e)| e)?;
    Ok(())
}

fn collection_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check_row_id(row_id: i64, expected: usize, table: &str) -> Result<()> {
    if row_id != expected as i64 {
        return Err(Error::CorruptCollection(format!(
            "{} row ids are not dense: found {} at position {}",
            table, row_id, expected
        )));
    }
    Ok(())
}

fn required<T: std::str::FromStr>(meta: &HashMap<String, String>, key: &str) -> Result<T> {
    meta.get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::CorruptCollection(format!("missing or invalid meta '{}'", key)))
}

fn info_from_meta(meta: &HashMap<String, String>) -> Result<CollectionInfo> {
    Ok(CollectionInfo {
        embedder_id: required(meta, "embedder_id")?,
        chunk_size: required(meta, "chunk_size")?,
        overlap: required(meta, "overlap")?,
        preview_max_chars: required(meta, "preview_max_chars")?,
        built_at: required(meta, "built_at")?,
    })
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> CollectionInfo {
        CollectionInfo {
            embedder_id: "test:d3".to_string(),
            chunk_size: 800,
            overlap: 100,
            preview_max_chars: 1000,
            built_at: 1704067200,
        }
    }

    fn fragment(source: &str, chunk_index: usize, text: &str) -> Fragment {
        Fragment {
            source: source.to_string(),
            chunk_index,
            text: text.to_string(),
        }
    }

    fn sample() -> Result<Collection> {
        let mut collection = Collection::new(info());
        collection.append_batch(
            &[
                fragment("a.txt", 0, "alpha one"),
                fragment("a.txt", 1, "alpha two"),
                fragment("b.md", 0, "bravo 한국어"),
            ],
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 0.6, 0.8],
                vec![-0.25, 0.5, 0.125],
            ],
        )?;
        Ok(collection)
    }

    #[test]
    fn test_blob_conversion() {
        let embedding = vec![1.0, 2.0, 3.0, -0.5];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_append_batch_requires_equal_lengths() {
        let mut collection = Collection::new(info());
        let result = collection.append_batch(&[fragment("a.txt", 0, "x")], &[]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("artifacts/default.db");
        let original = sample()?;

        save_collection(&path, &original)?;
        let db = CollectionDb::open(&path)?;
        let loaded = db.load()?;

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dim(), Some(3));
        assert_eq!(loaded.info(), original.info());
        assert_eq!(loaded.index(), original.index());
        assert_eq!(
            loaded.store().iter().collect::<Vec<_>>(),
            original.store().iter().collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_missing_collection() {
        let result = CollectionDb::open(Path::new("/tmp/corpus-search-missing/none.db"));
        match result {
            Err(Error::CollectionNotFound { name, .. }) => assert_eq!(name, "none"),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn test_rebuild_replaces_previous() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("c.db");
        save_collection(&path, &sample()?)?;

        let mut smaller = Collection::new(info());
        smaller.append_batch(&[fragment("z.txt", 0, "zulu")], &[vec![0.0, 0.0, 1.0]])?;
        save_collection(&path, &smaller)?;

        let loaded = CollectionDb::open(&path)?.load()?;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.store().get(0)?.source, "z.txt");
        assert!(!dir.path().join("c.db.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_empty_collection_is_not_saved() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.db");

        let result = save_collection(&path, &Collection::new(info()));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_stats_and_get_fragment() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("s.db");
        save_collection(&path, &sample()?)?;

        let db = CollectionDb::open(&path)?;
        let stats = db.stats()?;
        assert_eq!(stats.fragment_count, 3);
        assert_eq!(stats.vector_count, 3);
        assert_eq!(stats.dim, 3);
        assert_eq!(stats.embedder_id, "test:d3");
        assert!(stats.file_size_bytes > 0);

        assert_eq!(db.get_fragment(2)?.preview, "bravo 한국어");
        assert!(matches!(db.get_fragment(3), Err(Error::NotFound { row_id: 3, len: 3 })));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_stats_reports_missing_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gone.db");
        save_collection(&path, &sample()?)?;

        let db = CollectionDb::open(&path)?;
        fs::remove_file(&path)?;
        assert!(matches!(db.stats(), Err(Error::Io(_))));
        Ok(())
    }

    #[test]
    fn test_misaligned_file_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.db");
        save_collection(&path, &sample()?)?;

        {
            let conn = Connection::open(&path)?;
            conn.execute("DELETE FROM fragments WHERE row_id = 2", [])?;
        }

        let result = CollectionDb::open(&path)?.load();
        assert!(matches!(result, Err(Error::CorruptCollection(_))));
        Ok(())
    }
}
