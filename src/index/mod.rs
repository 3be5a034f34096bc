//! Corpus indexing
//!
//! Architecture:
//! - SparseIndex: tantivy BM25 over title (x3) and body
//! - DenseIndex: one encoder vector per job, exact inner-product search
//! - EmbeddingProvider trait for abstraction over encoders
//! - Manifests tie each cached artifact to the corpus id list it was built from

mod dense;
mod manifest;
mod provider;
mod sparse;

pub use dense::{document_text, DenseHit, DenseIndex, DenseIndexError};
pub use manifest::{IndexManifest, MANIFEST_FILE};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashEmbeddingProvider};
pub use sparse::{SparseIndex, SparseIndexError, TITLE_WEIGHT};

use crate::config::EmbeddingConfig;
use crate::error::{JobMatchError, Result};
use crate::model::Corpus;
use std::path::Path;
use std::sync::Arc;

/// Whether an index came from cache or was (re)built this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Loaded,
    Built,
}

impl IndexSource {
    fn from_built(built: bool) -> Self {
        if built {
            Self::Built
        } else {
            Self::Loaded
        }
    }
}

/// Retrieval indices over one corpus snapshot
pub struct CorpusIndex {
    pub sparse: SparseIndex,
    /// Absent when the dense modality is switched off
    pub dense: Option<DenseIndex>,
    pub sparse_source: IndexSource,
    pub dense_source: Option<IndexSource>,
}

impl CorpusIndex {
    /// Build or load the indices under `index_dir`.
    ///
    /// The dense index is only built or loaded when an encoder is given, so
    /// a sparse-only run never encodes the corpus.
    pub fn open(
        index_dir: &Path,
        corpus: &Corpus,
        provider: Option<&dyn EmbeddingProvider>,
        batch_size: usize,
    ) -> Result<Self> {
        let (sparse, sparse_built) = SparseIndex::build_or_load(&index_dir.join("sparse"), corpus)
            .map_err(|e| JobMatchError::Index(format!("sparse index: {}", e)))?;

        let (dense, dense_source) = match provider {
            Some(provider) => {
                let (dense, dense_built) =
                    DenseIndex::build_or_load(&index_dir.join("dense"), corpus, provider, batch_size)
                        .map_err(|e| JobMatchError::Index(format!("dense index: {}", e)))?;
                (Some(dense), Some(IndexSource::from_built(dense_built)))
            }
            None => {
                tracing::info!("Dense modality disabled, skipping dense index");
                (None, None)
            }
        };

        Ok(Self {
            sparse,
            dense,
            sparse_source: IndexSource::from_built(sparse_built),
            dense_source,
        })
    }
}

/// Construct the encoder named by the embedding configuration
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend.as_str() {
        "hash" => Ok(Arc::new(HashEmbeddingProvider::new(config.dimension))),
        "fastembed" => {
            let provider = FastEmbedProvider::new(&config.model, config.batch_size)
                .map_err(|e| JobMatchError::Index(e.to_string()))?;
            if provider.dimension() != config.dimension {
                return Err(JobMatchError::InvalidConfigValue {
                    path: "embedding.dimension".to_string(),
                    message: format!(
                        "{} produces {}-dimensional vectors, config says {}",
                        config.model,
                        provider.dimension(),
                        config.dimension
                    ),
                });
            }
            Ok(Arc::new(provider))
        }
        other => Err(JobMatchError::InvalidConfigValue {
            path: "embedding.backend".to_string(),
            message: format!("Unknown embedding backend '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobDocument, JobMetadata};
    use tempfile::TempDir;

    fn corpus() -> Corpus {
        Corpus::new(vec![JobDocument {
            id: "J1".to_string(),
            title: "Rust engineer".to_string(),
            text: "Async services.".to_string(),
            metadata: JobMetadata::default(),
        }])
    }

    #[test]
    fn test_sparse_only_open_skips_dense_build() {
        let temp = TempDir::new().unwrap();

        let index = CorpusIndex::open(temp.path(), &corpus(), None, 8).unwrap();
        assert_eq!(index.sparse_source, IndexSource::Built);
        assert!(index.dense.is_none());
        assert!(index.dense_source.is_none());
        assert!(!temp.path().join("dense").exists());
    }

    #[test]
    fn test_open_with_encoder_builds_dense() {
        let temp = TempDir::new().unwrap();
        let provider = HashEmbeddingProvider::new(16);

        let index = CorpusIndex::open(temp.path(), &corpus(), Some(&provider), 8).unwrap();
        assert_eq!(index.dense_source, Some(IndexSource::Built));
        assert_eq!(index.dense.as_ref().map(DenseIndex::len), Some(1));
    }
}
