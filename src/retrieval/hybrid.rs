//! Hybrid retrieval: per-condition sparse and dense searches fused into one
//! ranked job list per candidate

use super::fusion::{FusedHit, FusionAccumulator, FusionParams};
use crate::index::{CorpusIndex, DenseIndex, EmbeddingProvider, SparseIndex};
use crate::model::{ConditionList, Corpus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Keyword search failed: {0}")]
    KeywordSearchError(String),
}

/// Retrieval signal a source contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Sparse,
    Dense,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Sparse => write!(f, "bm25"),
            Modality::Dense => write!(f, "dense"),
        }
    }
}

/// Anything that can rank job ids for a batch of conditions
pub trait RankedSource: Send + Sync {
    fn modality(&self) -> Modality;

    /// Top `depth` job ids for each condition, one list per condition in
    /// input order, best first
    fn top_n(&self, conditions: &[String], depth: usize) -> Result<Vec<Vec<String>>, SearchError>;
}

/// Lists may be shorter than `depth`: jobs sharing no term with a condition
/// are not ranked at all.
impl RankedSource for SparseIndex {
    fn modality(&self) -> Modality {
        Modality::Sparse
    }

    fn top_n(&self, conditions: &[String], depth: usize) -> Result<Vec<Vec<String>>, SearchError> {
        conditions
            .iter()
            .map(|condition| {
                self.search(condition, depth)
                    .map_err(|e| SearchError::KeywordSearchError(e.to_string()))
            })
            .collect()
    }
}

/// Dense index paired with the encoder that produced it
pub struct DenseSource<'a> {
    index: &'a DenseIndex,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> DenseSource<'a> {
    pub fn new(index: &'a DenseIndex, provider: &'a dyn EmbeddingProvider) -> Self {
        Self { index, provider }
    }
}

impl RankedSource for DenseSource<'_> {
    fn modality(&self) -> Modality {
        Modality::Dense
    }

    fn top_n(&self, conditions: &[String], depth: usize) -> Result<Vec<Vec<String>>, SearchError> {
        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .provider
            .embed_batch(conditions)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        if embeddings.len() != conditions.len() {
            return Err(SearchError::EmbeddingError(format!(
                "expected {} query embeddings, got {}",
                conditions.len(),
                embeddings.len()
            )));
        }

        embeddings
            .iter()
            .map(|query| {
                let hits = self
                    .index
                    .search(query, depth)
                    .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;

                Ok(hits
                    .into_iter()
                    .filter_map(|hit| match self.index.id_at(hit.position) {
                        Some(id) => Some(id.to_string()),
                        None => {
                            tracing::warn!("Dense index returned out-of-range position {}", hit.position);
                            None
                        }
                    })
                    .collect())
            })
            .collect()
    }
}

/// Fused ranking for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub hits: Vec<FusedHit>,
    /// Hits dropped because the corpus does not know their id
    pub dropped: usize,
}

impl RetrievalOutcome {
    pub fn job_ids(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.job_id.clone()).collect()
    }
}

/// Hybrid retriever over any set of ranked sources.
///
/// Sources are credited in the order they were added, per condition.
pub struct HybridRetriever<'a> {
    corpus: &'a Corpus,
    sources: Vec<&'a dyn RankedSource>,
    params: FusionParams,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(corpus: &'a Corpus, params: FusionParams) -> Self {
        Self {
            corpus,
            sources: Vec::new(),
            params,
        }
    }

    /// Retriever over the corpus indices, sparse first
    pub fn for_index(
        corpus: &'a Corpus,
        index: &'a CorpusIndex,
        dense: Option<&'a DenseSource<'a>>,
        params: FusionParams,
    ) -> Self {
        let retriever = Self::new(corpus, params).with_source(&index.sparse);
        match dense {
            Some(dense) => retriever.with_source(dense),
            None => retriever,
        }
    }

    pub fn with_source(mut self, source: &'a dyn RankedSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    fn is_enabled(&self, modality: Modality) -> bool {
        match modality {
            Modality::Sparse => self.params.bm25_enabled,
            Modality::Dense => self.params.dense_enabled,
        }
    }

    /// Fuse every enabled source's rankings for `conditions`
    pub fn retrieve(&self, conditions: &ConditionList) -> Result<RetrievalOutcome, SearchError> {
        if conditions.is_empty() {
            return Ok(RetrievalOutcome {
                hits: Vec::new(),
                dropped: 0,
            });
        }

        let depth = self.params.depth;

        let mut rankings = Vec::new();
        for source in &self.sources {
            let modality = source.modality();
            if !self.is_enabled(modality) {
                tracing::debug!("Skipping disabled {} source", modality);
                continue;
            }
            let lists = source.top_n(&conditions.conditions, depth)?;
            rankings.push((modality, lists));
        }

        let mut accumulator = FusionAccumulator::new(self.params.k);
        let mut dropped = 0;

        for condition_rank in 0..conditions.len() {
            for (modality, lists) in &rankings {
                let Some(list) = lists.get(condition_rank) else {
                    continue;
                };

                for (rank, job_id) in list.iter().take(depth).enumerate() {
                    if !self.corpus.contains(job_id) {
                        tracing::warn!("{} index returned unknown job id {}, dropping", modality, job_id);
                        dropped += 1;
                        continue;
                    }
                    accumulator.add(condition_rank, rank, job_id);
                }
            }
        }

        tracing::debug!(
            "Fused {} conditions into {} jobs ({} dropped)",
            conditions.len(),
            accumulator.len(),
            dropped
        );

        Ok(RetrievalOutcome {
            hits: accumulator.into_ranked(depth),
            dropped,
        })
    }
}
