//! Directory-backed provider handing out per-identity vector stores.

use crate::embedding::Embedder;
use crate::error::MemoryError;
use crate::model::{Identity, MemoryRecord};
use crate::store::VectorMemoryStore;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the persisted index inside an identity directory.
pub const STORE_FILE: &str = "memory.jsonl";

/// Resolves identities to stores under `<root>/<identity>/memory.jsonl`.
#[derive(Clone)]
pub struct VectorStoreProvider {
    /// Root directory for all identity stores.
    root: PathBuf,
    /// Embedding function shared by every store.
    embedder: Arc<dyn Embedder>,
}

impl VectorStoreProvider {
    /// Create a provider under the given root, creating the directory.
    pub fn new(root: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("initialized vector store provider (root={})", root.display());
        Ok(Self { root, embedder })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Durable location for an identity's index.
    pub fn backing_path(&self, identity: &Identity) -> PathBuf {
        self.root.join(identity.as_str()).join(STORE_FILE)
    }

    /// Reconstitute the persisted store for `identity`.
    ///
    /// Returns [`MemoryError::NotFound`] when nothing was saved yet.
    pub fn load(&self, identity: &Identity) -> Result<VectorMemoryStore, MemoryError> {
        VectorMemoryStore::read(
            identity.clone(),
            self.backing_path(identity),
            self.embedder.clone(),
        )
    }

    /// Like [`Self::load`] but maps the cold-start case to `None`.
    pub fn try_load(&self, identity: &Identity) -> Result<Option<VectorMemoryStore>, MemoryError> {
        match self.load(identity) {
            Ok(store) => Ok(Some(store)),
            Err(MemoryError::NotFound(_)) => {
                debug!("no persisted memory (identity={})", identity);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Build a fresh in-memory store from records. Does not touch disk.
    pub async fn create_from_records(
        &self,
        identity: &Identity,
        records: Vec<MemoryRecord>,
    ) -> Result<VectorMemoryStore, MemoryError> {
        let mut store = VectorMemoryStore::empty(
            identity.clone(),
            self.backing_path(identity),
            self.embedder.clone(),
        );
        store.append(records).await?;
        Ok(store)
    }
}
