//! Resumable retrieval: one stored fused list per candidate

use super::{FusedHit, FusionParams, HybridRetriever};
use crate::error::{JobMatchError, Result};
use crate::model::{ConditionList, Corpus};
use crate::storage::{ResultStore, UnitKey};
use serde_json::{Map, Value};

/// Fingerprint of everything a fused list depends on besides the
/// candidate's conditions.
///
/// Stored lists are keyed by it, so changing N, k, a modality gate, the
/// condition source, the encoder or the corpus never reuses stale lists.
pub fn retrieval_scope(
    params: &FusionParams,
    query_type: &str,
    max_conditions: usize,
    encoder: Option<&str>,
    corpus: &Corpus,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(
        format!(
            "depth={};k={};bm25={};dense={};query_type={};max_conditions={};encoder={}\n",
            params.depth,
            params.k.to_bits(),
            params.bm25_enabled,
            params.dense_enabled,
            query_type,
            max_conditions,
            encoder.unwrap_or("-")
        )
        .as_bytes(),
    );
    for job in corpus.jobs() {
        hasher.update(job.id.as_bytes());
        hasher.update(b"\n");
    }

    let digest = hasher.finalize().to_hex();
    digest.as_str()[..16].to_string()
}

/// Outcome counts of one retrieval run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalSummary {
    pub computed: usize,
    pub skipped: usize,
    /// Search or store failure; retried next run
    pub failed: usize,
}

/// Drives the retriever over candidates, persisting each list as soon as it
/// is fused
pub struct RetrievalRunner<'a> {
    retriever: &'a HybridRetriever<'a>,
    store: &'a dyn ResultStore,
    scope: String,
}

impl<'a> RetrievalRunner<'a> {
    pub fn new(retriever: &'a HybridRetriever<'a>, store: &'a dyn ResultStore, scope: impl Into<String>) -> Self {
        Self {
            retriever,
            store,
            scope: scope.into(),
        }
    }

    fn key(&self, candidate_id: &str) -> UnitKey {
        UnitKey::retrieval(candidate_id, &self.scope)
    }

    pub fn run(&self, candidates: &[(String, ConditionList)]) -> RetrievalSummary {
        let mut summary = RetrievalSummary::default();

        tracing::info!(
            "Retrieving for {} candidates (scope {})",
            candidates.len(),
            self.scope
        );

        for (candidate_id, conditions) in candidates {
            let key = self.key(candidate_id);

            match self.store.exists(&key) {
                Ok(true) => {
                    tracing::debug!("Skipping {}, already retrieved", key);
                    summary.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Store lookup for {} failed: {}", key, e);
                    summary.failed += 1;
                    continue;
                }
            }

            let outcome = match self.retriever.retrieve(conditions) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Retrieval failed for candidate {}, will retry next run: {}", candidate_id, e);
                    summary.failed += 1;
                    continue;
                }
            };

            let hits = match serde_json::to_value(&outcome.hits) {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::error!("Failed to serialize hits for {}: {}", key, e);
                    summary.failed += 1;
                    continue;
                }
            };

            match self.store.put(&key, &hits) {
                Ok(_) => {
                    summary.computed += 1;
                    tracing::debug!(
                        "Candidate {}: {} conditions -> {} jobs",
                        candidate_id,
                        conditions.len(),
                        outcome.hits.len()
                    );
                }
                Err(e) => {
                    tracing::error!("Failed to persist {}: {}", key, e);
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Retrieval finished: {} computed, {} skipped, {} failed",
            summary.computed,
            summary.skipped,
            summary.failed
        );
        summary
    }

    /// Stored lists as candidate -> ranked job ids, in the given order.
    ///
    /// Candidates without a stored list are left out.
    pub fn export<'c>(&self, candidate_ids: impl IntoIterator<Item = &'c str>) -> Result<Map<String, Value>> {
        let mut output = Map::new();

        for candidate_id in candidate_ids {
            let key = self.key(candidate_id);
            let Some(stored) = self.store.get(&key)? else {
                continue;
            };

            let hits: Vec<FusedHit> = serde_json::from_value(stored).map_err(|e| JobMatchError::Json {
                source: e,
                context: format!("Stored retrieval list for {} is malformed", key),
            })?;

            let ids = hits.into_iter().map(|hit| Value::String(hit.job_id)).collect();
            output.insert(candidate_id.to_string(), Value::Array(ids));
        }

        Ok(output)
    }
}
