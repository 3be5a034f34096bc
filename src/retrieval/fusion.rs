//! Weighted reciprocal rank fusion across conditions and modalities

use crate::config::RetrievalConfig;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid fusion offset: k must be a positive finite number, got {0}")]
    InvalidOffset(f64),
}

/// Tunables surfaced at the retrieval boundary
#[derive(Debug, Clone, PartialEq)]
pub struct FusionParams {
    /// Per-modality result depth and final list length (N)
    pub depth: usize,
    /// Rank offset (k)
    pub k: f64,
    pub bm25_enabled: bool,
    pub dense_enabled: bool,
}

impl FusionParams {
    pub fn new(
        depth: usize,
        k: f64,
        bm25_enabled: bool,
        dense_enabled: bool,
    ) -> Result<Self, FusionError> {
        if !(k.is_finite() && k > 0.0) {
            return Err(FusionError::InvalidOffset(k));
        }

        Ok(Self {
            depth,
            k,
            bm25_enabled,
            dense_enabled,
        })
    }

    pub fn from_config(config: &RetrievalConfig) -> Result<Self, FusionError> {
        Self::new(
            config.depth,
            config.rrf_k,
            config.bm25_enabled,
            config.dense_enabled,
        )
    }
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            depth: 2000,
            k: 20.0,
            bm25_enabled: true,
            dense_enabled: true,
        }
    }
}

/// One job in a fused ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub job_id: String,
    pub score: f64,
}

/// Running fusion scores for one candidate's retrieval call.
///
/// Jobs are kept in first-contribution order so that ties resolve the same
/// way on every run.
#[derive(Debug)]
pub struct FusionAccumulator {
    k: f64,
    hits: Vec<FusedHit>,
    positions: AHashMap<String, usize>,
}

impl FusionAccumulator {
    pub fn new(k: f64) -> Self {
        Self {
            k,
            hits: Vec::new(),
            positions: AHashMap::new(),
        }
    }

    /// Contribution of a hit at 0-based `rank` for the condition at
    /// 0-based priority `condition_rank`
    pub fn contribution(&self, rank: usize, condition_rank: usize) -> f64 {
        (1.0 / (rank as f64 + self.k)) * (1.0 / (condition_rank as f64 + 1.0))
    }

    /// Fold one modality's ranked list for one condition into the scores
    pub fn add_ranking<S: AsRef<str>>(&mut self, condition_rank: usize, ranked_ids: &[S]) {
        for (rank, job_id) in ranked_ids.iter().enumerate() {
            self.add(condition_rank, rank, job_id.as_ref());
        }
    }

    /// Credit a single hit found at `rank` of some modality's list
    pub fn add(&mut self, condition_rank: usize, rank: usize, job_id: &str) {
        let delta = self.contribution(rank, condition_rank);

        match self.positions.get(job_id) {
            Some(&pos) => self.hits[pos].score += delta,
            None => {
                self.positions.insert(job_id.to_string(), self.hits.len());
                self.hits.push(FusedHit {
                    job_id: job_id.to_string(),
                    score: delta,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Sort by descending score (stable) and keep the top `depth`
    pub fn into_ranked(self, depth: usize) -> Vec<FusedHit> {
        let mut hits = self.hits;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(depth);
        hits
    }
}
