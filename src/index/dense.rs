/// Exact inner-product vector index over job postings
use super::manifest::IndexManifest;
use super::provider::{EmbeddingError, EmbeddingProvider};
use crate::model::{Corpus, JobDocument};
use ndarray::{Array2, ArrayView1};
use std::path::Path;
use thiserror::Error;

const VECTORS_FILE: &str = "vectors.zst";
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Error, Debug)]
pub enum DenseIndexError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Corrupt vector cache: {0}")]
    Corrupt(String),
}

/// Scored position in the index
#[derive(Debug, Clone, PartialEq)]
pub struct DenseHit {
    /// Row in the vector matrix
    pub position: usize,
    /// Inner product with the query
    pub score: f32,
}

/// One vector per job, row `i` belongs to `ids[i]`
pub struct DenseIndex {
    ids: Vec<String>,
    vectors: Array2<f32>,
}

impl DenseIndex {
    /// Load cached vectors from `index_path`, or encode the corpus when the
    /// cache is missing, corrupt, or from another corpus or encoder.
    ///
    /// Returns the index and whether it was rebuilt.
    pub fn build_or_load(
        index_path: &Path,
        corpus: &Corpus,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<(Self, bool), DenseIndexError> {
        let ids = corpus.ids();

        match Self::load(index_path, &ids, provider) {
            Ok(Some(index)) => {
                tracing::info!("Loaded dense index ({} jobs) from {}", index.len(), index_path.display());
                return Ok((index, false));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Dense index cache unusable, rebuilding: {}", e),
        }

        let index = Self::build(corpus, provider, batch_size)?;
        index.save(index_path, provider.model_name())?;
        Ok((index, true))
    }

    /// Encode every job, in corpus order
    pub fn build(
        corpus: &Corpus,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self, DenseIndexError> {
        let dimension = provider.dimension();
        let mut data = Vec::with_capacity(corpus.len() * dimension);

        tracing::info!(
            "Encoding {} jobs with {} in batches of {}",
            corpus.len(),
            provider.model_name(),
            batch_size
        );

        for (batch_idx, batch) in corpus.jobs().chunks(batch_size.max(1)).enumerate() {
            let texts: Vec<String> = batch.iter().map(document_text).collect();
            let embeddings = provider.embed_batch(&texts)?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                }
                .into());
            }

            for embedding in embeddings {
                if embedding.len() != dimension {
                    return Err(DenseIndexError::InvalidDimension {
                        expected: dimension,
                        actual: embedding.len(),
                    });
                }
                data.extend_from_slice(&embedding);
            }
            tracing::debug!("Encoded batch {}", batch_idx);
        }

        Self::from_rows(corpus.ids(), dimension, data)
    }

    fn from_rows(ids: Vec<String>, dimension: usize, data: Vec<f32>) -> Result<Self, DenseIndexError> {
        let vectors = Array2::from_shape_vec((ids.len(), dimension), data)
            .map_err(|e| DenseIndexError::Corrupt(e.to_string()))?;
        Ok(Self { ids, vectors })
    }

    /// Persist vectors, then the manifest that vouches for them
    fn save(&self, index_path: &Path, model: &str) -> Result<(), DenseIndexError> {
        std::fs::create_dir_all(index_path)?;

        let bytes: Vec<u8> = self
            .vectors
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        let compressed = zstd::encode_all(&bytes[..], COMPRESSION_LEVEL)?;

        let temp_path = index_path.join(format!("{}.tmp", VECTORS_FILE));
        std::fs::write(&temp_path, compressed)?;
        std::fs::rename(&temp_path, index_path.join(VECTORS_FILE))?;

        let mut manifest = IndexManifest::new(self.ids.clone());
        manifest.model = Some(model.to_string());
        manifest.dimension = self.dimension();
        manifest.checksum = Some(checksum);
        manifest.write(index_path)?;

        tracing::info!("Saved dense index ({} vectors) to {}", self.len(), index_path.display());
        Ok(())
    }

    /// Read the cache; `Ok(None)` on a clean miss, `Err` on corruption
    fn load(
        index_path: &Path,
        ids: &[String],
        provider: &dyn EmbeddingProvider,
    ) -> Result<Option<Self>, DenseIndexError> {
        let Some(manifest) = IndexManifest::read(index_path) else {
            tracing::info!("No dense index manifest in {}", index_path.display());
            return Ok(None);
        };

        if !manifest.matches_ids(ids) {
            tracing::warn!(
                "Dense index id list differs from corpus ({} cached, {} in corpus)",
                manifest.ids.len(),
                ids.len()
            );
            return Ok(None);
        }

        if manifest.model.as_deref() != Some(provider.model_name())
            || manifest.dimension != provider.dimension()
        {
            tracing::warn!(
                "Dense index was built with {:?} ({}D), current encoder is {} ({}D)",
                manifest.model,
                manifest.dimension,
                provider.model_name(),
                provider.dimension()
            );
            return Ok(None);
        }

        let compressed = std::fs::read(index_path.join(VECTORS_FILE))?;
        let bytes = zstd::decode_all(&compressed[..])?;

        let expected_len = manifest.ids.len() * manifest.dimension * 4;
        if bytes.len() != expected_len {
            return Err(DenseIndexError::Corrupt(format!(
                "expected {} bytes of vectors, found {}",
                expected_len,
                bytes.len()
            )));
        }

        let checksum = blake3::hash(&bytes).to_hex().to_string();
        if manifest.checksum.as_deref() != Some(checksum.as_str()) {
            return Err(DenseIndexError::Corrupt("checksum mismatch".to_string()));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Self::from_rows(manifest.ids, manifest.dimension, data).map(Some)
    }

    /// Exact top-`k` search by inner product.
    ///
    /// Ties keep index order, so results are reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<DenseHit>, DenseIndexError> {
        if query.len() != self.dimension() {
            return Err(DenseIndexError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));

        let mut hits: Vec<DenseHit> = scores
            .iter()
            .enumerate()
            .map(|(position, &score)| DenseHit { position, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        Ok(hits)
    }

    /// Job id stored at `position`
    pub fn id_at(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Text the encoder sees for a job: title followed by body
pub fn document_text(job: &JobDocument) -> String {
    format!("{}\n{}", job.title, job.text)
}
