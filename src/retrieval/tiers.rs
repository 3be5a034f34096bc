//! Rank bands over a retrieved job list

use crate::config::TierConfig;
use crate::model::Corpus;

/// Retrieved jobs falling in one rank band
#[derive(Debug, Clone, PartialEq)]
pub struct Tier {
    /// Band label: "0", "1", ...
    pub label: String,
    pub job_ids: Vec<String>,
}

/// Cumulative band upper bounds; `[5, 15, 30]` puts ranks 1-5 in tier
/// "0", 6-15 in "1" and 16-30 in "2"
#[derive(Debug, Clone, PartialEq)]
pub struct TierBands {
    bounds: Vec<usize>,
}

impl TierBands {
    pub fn new(bounds: Vec<usize>) -> Self {
        Self { bounds }
    }

    pub fn from_config(config: &TierConfig) -> Self {
        Self::new(config.bounds.clone())
    }

    /// Ranks past the last bound are never evaluated
    pub fn limit(&self) -> usize {
        self.bounds.last().copied().unwrap_or(0)
    }

    /// Band index for a 1-based rank
    pub fn band_of(&self, rank: usize) -> Option<usize> {
        if rank == 0 {
            return None;
        }
        self.bounds.iter().position(|&upper| rank <= upper)
    }

    /// Cut `ranked` into bands, dropping ids the corpus does not contain.
    ///
    /// Every band is returned, empty or not. A dropped id still occupies
    /// its rank.
    pub fn assign(&self, candidate_id: &str, ranked: &[String], corpus: &Corpus) -> Vec<Tier> {
        let mut tiers: Vec<Tier> = (0..self.bounds.len())
            .map(|idx| Tier {
                label: idx.to_string(),
                job_ids: Vec::new(),
            })
            .collect();

        for (idx, job_id) in ranked.iter().take(self.limit()).enumerate() {
            if !corpus.contains(job_id) {
                tracing::warn!(
                    "Job {} retrieved for candidate {} is not in the corpus, skipping",
                    job_id,
                    candidate_id
                );
                continue;
            }
            if let Some(band) = self.band_of(idx + 1) {
                tiers[band].job_ids.push(job_id.clone());
            }
        }

        tiers
    }
}

impl Default for TierBands {
    fn default() -> Self {
        Self::from_config(&TierConfig::default())
    }
}
