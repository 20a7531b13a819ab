//! Per-identity vector memory store.

use crate::embedding::{Embedder, check_dimensions, rank};
use crate::error::MemoryError;
use crate::model::{Identity, IndexedRecord, MemoryRecord, ScoredRecord};
use log::{debug, info};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Embedded, similarity-searchable memory for one identity.
///
/// Mutations stay in memory until [`VectorMemoryStore::save`] is called.
pub struct VectorMemoryStore {
    identity: Identity,
    backing_path: PathBuf,
    entries: Vec<IndexedRecord>,
    dimension: Option<usize>,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for VectorMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorMemoryStore")
            .field("identity", &self.identity)
            .field("backing_path", &self.backing_path)
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl VectorMemoryStore {
    /// Empty store bound to a backing path. Nothing is written.
    pub(crate) fn empty(
        identity: Identity,
        backing_path: PathBuf,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            identity,
            backing_path,
            entries: Vec::new(),
            dimension: None,
            embedder,
        }
    }

    /// Read a persisted store. Missing file maps to `NotFound`.
    pub(crate) fn read(
        identity: Identity,
        backing_path: PathBuf,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, MemoryError> {
        if !backing_path.exists() {
            return Err(MemoryError::NotFound(identity.to_string()));
        }
        let reader = BufReader::new(File::open(&backing_path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: IndexedRecord = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        let embeddings: Vec<Vec<f32>> = entries.iter().map(|e| e.embedding.clone()).collect();
        let dimension = check_dimensions(None, &embeddings)?;
        debug!(
            "loaded memory store (identity={}, records={})",
            identity,
            entries.len()
        );
        Ok(Self {
            identity,
            backing_path,
            entries,
            dimension,
            embedder,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn backing_path(&self) -> &Path {
        &self.backing_path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.entries.iter().map(|entry| &entry.record)
    }

    /// Return up to `k` records closest to `query`, nearest first.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let scored = self.similarity_search_with_scores(query, k).await?;
        Ok(scored.into_iter().map(|scored| scored.record).collect())
    }

    /// Like [`Self::similarity_search`] but keeps the cosine distance.
    pub async fn similarity_search_with_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embed_one(query).await?;
        if let Some(expected) = self.dimension
            && expected != query_embedding.len()
        {
            return Err(MemoryError::Dimension {
                expected,
                actual: query_embedding.len(),
            });
        }
        let ranked = rank(&self.entries, &query_embedding, k);
        debug!(
            "similarity search (identity={}, k={}, returned={})",
            self.identity,
            k,
            ranked.len()
        );
        Ok(ranked)
    }

    /// Embed and insert records in order. Not durable until `save`.
    pub async fn append(&mut self, records: Vec<MemoryRecord>) -> Result<(), MemoryError> {
        if records.is_empty() {
            return Ok(());
        }
        let texts = records.iter().map(|record| record.content.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != records.len() {
            return Err(MemoryError::Embedding(format!(
                "expected {} embeddings, got {}",
                records.len(),
                embeddings.len()
            )));
        }
        self.dimension = check_dimensions(self.dimension, &embeddings)?;
        let added = records.len();
        self.entries.extend(
            records
                .into_iter()
                .zip(embeddings)
                .map(|(record, embedding)| IndexedRecord { record, embedding }),
        );
        debug!(
            "appended memory records (identity={}, added={}, total={})",
            self.identity,
            added,
            self.entries.len()
        );
        Ok(())
    }

    /// Atomically replace the persisted index with the in-memory one.
    pub fn save(&self) -> Result<(), MemoryError> {
        if let Some(dir) = self.backing_path.parent() {
            fs::create_dir_all(dir).map_err(persisting(dir))?;
        }
        let temp_path = self.backing_path.with_extension("jsonl.tmp");
        {
            let file = File::create(&temp_path).map_err(persisting(&temp_path))?;
            let mut writer = BufWriter::new(file);
            for entry in &self.entries {
                let line = serde_json::to_string(entry)
                    .map_err(|err| persisting(&temp_path)(std::io::Error::other(err)))?;
                writeln!(writer, "{line}").map_err(persisting(&temp_path))?;
            }
            writer.flush().map_err(persisting(&temp_path))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(persisting(&temp_path))?;
        }
        fs::rename(&temp_path, &self.backing_path).map_err(persisting(&self.backing_path))?;
        info!(
            "saved memory store (identity={}, records={})",
            self.identity,
            self.entries.len()
        );
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.embedder
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("empty embedding response".to_string()))
    }
}

/// Map an IO error on `path` into a persistence error.
fn persisting(path: &Path) -> impl FnOnce(std::io::Error) -> MemoryError {
    let path = path.to_path_buf();
    move |source| MemoryError::Persistence { path, source }
}
