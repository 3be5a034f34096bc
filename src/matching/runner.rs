//! Resumable batch matching over (candidate, job) work units

use super::judge::{EligibilityJudge, PartitionOutcome};
use super::Polarity;
use crate::error::Result;
use crate::model::{Candidate, Corpus, JobDocument};
use crate::retrieval::{Tier, TierBands};
use crate::storage::{ResultStore, UnitKey};
use ahash::AHashMap;
use serde_json::{Map, Value};

/// One candidate and the tiered jobs to judge for them
#[derive(Debug, Clone)]
pub struct PlannedCandidate {
    pub candidate: Candidate,
    pub tiers: Vec<Tier>,
}

/// Work units in evaluation order: candidates as retrieved, tiers in band
/// order, jobs in rank order
#[derive(Debug, Clone, Default)]
pub struct MatchPlan {
    pub candidates: Vec<PlannedCandidate>,
}

impl MatchPlan {
    /// Tier each candidate's retrieved list.
    ///
    /// Candidates with a retrieval entry but no resume are skipped with a
    /// warning.
    pub fn build(
        retrieved: impl IntoIterator<Item = (String, Vec<String>)>,
        candidates: &[Candidate],
        corpus: &Corpus,
        bands: &TierBands,
    ) -> Self {
        let by_id: AHashMap<&str, &Candidate> =
            candidates.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut planned = Vec::new();
        for (candidate_id, ranked) in retrieved {
            let Some(candidate) = by_id.get(candidate_id.as_str()) else {
                tracing::warn!("No resume for retrieved candidate {}, skipping", candidate_id);
                continue;
            };

            planned.push(PlannedCandidate {
                candidate: (*candidate).clone(),
                tiers: bands.assign(&candidate_id, &ranked, corpus),
            });
        }

        Self { candidates: planned }
    }

    /// Total (candidate, job) units
    pub fn units(&self) -> usize {
        self.candidates
            .iter()
            .flat_map(|c| c.tiers.iter())
            .map(|tier| tier.job_ids.len())
            .sum()
    }
}

/// Outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Judged and persisted this run
    pub computed: usize,
    /// Already in the store
    pub skipped: usize,
    /// Judge or store failure; retried next run
    pub failed: usize,
    /// Partitions persisted as raw replies
    pub malformed: usize,
}

/// Drives the judge over a plan, persisting each unit as soon as it is done
pub struct MatchingRunner<'a> {
    judge: &'a dyn EligibilityJudge,
    store: &'a dyn ResultStore,
    corpus: &'a Corpus,
}

impl<'a> MatchingRunner<'a> {
    pub fn new(judge: &'a dyn EligibilityJudge, store: &'a dyn ResultStore, corpus: &'a Corpus) -> Self {
        Self { judge, store, corpus }
    }

    pub async fn run(&self, plan: &MatchPlan) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = plan.units();

        tracing::info!("Matching {} units for {} candidates", total, plan.candidates.len());

        for planned in &plan.candidates {
            let candidate = &planned.candidate;

            for tier in &planned.tiers {
                for job_id in &tier.job_ids {
                    let Some(job) = self.corpus.get(job_id) else {
                        continue;
                    };
                    let key = UnitKey::matching(&candidate.id, job_id);

                    match self.store.exists(&key) {
                        Ok(true) => {
                            tracing::debug!("Skipping {}, already computed", key);
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

                    let (record, malformed) = match self.evaluate_unit(candidate, job).await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!("Judge failed for {}, will retry next run: {}", key, e);
                            summary.failed += 1;
                            continue;
                        }
                    };

                    match self.store.put(&key, &record) {
                        Ok(_) => {
                            summary.computed += 1;
                            summary.malformed += malformed;
                            tracing::info!(
                                "Matched {} (tier {}) [{}/{}]",
                                key,
                                tier.label,
                                summary.computed + summary.skipped,
                                total
                            );
                        }
                        Err(e) => {
                            tracing::error!("Failed to persist {}: {}", key, e);
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Matching finished: {} computed, {} skipped, {} failed, {} malformed partitions",
            summary.computed,
            summary.skipped,
            summary.failed,
            summary.malformed
        );
        summary
    }

    /// Judge both partitions; the record is only produced if both calls
    /// succeed
    async fn evaluate_unit(
        &self,
        candidate: &Candidate,
        job: &JobDocument,
    ) -> std::result::Result<(Value, usize), super::JudgeError> {
        let mut record = Map::new();
        let mut malformed = 0;

        for polarity in Polarity::ALL {
            let outcome: PartitionOutcome = self.judge.evaluate(candidate, job, polarity).await?;
            if outcome.is_malformed() {
                malformed += 1;
            }
            record.insert(polarity.as_str().to_string(), outcome.into_value());
        }

        Ok((Value::Object(record), malformed))
    }

    /// Render the store as candidate -> tier -> job -> record, in plan order.
    ///
    /// Units not yet computed are left out.
    pub fn export(&self, plan: &MatchPlan) -> Result<Map<String, Value>> {
        let mut output = Map::new();

        for planned in &plan.candidates {
            let mut tiers = Map::new();
            for tier in &planned.tiers {
                let mut jobs = Map::new();
                for job_id in &tier.job_ids {
                    let key = UnitKey::matching(&planned.candidate.id, job_id);
                    if let Some(record) = self.store.get(&key)? {
                        jobs.insert(job_id.clone(), record);
                    }
                }
                tiers.insert(tier.label.clone(), Value::Object(jobs));
            }
            output.insert(planned.candidate.id.clone(), Value::Object(tiers));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::JudgeError;
    use crate::model::JobMetadata;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Approves everything; fails on one job id
    struct ScriptedJudge {
        fail_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EligibilityJudge for ScriptedJudge {
        async fn evaluate(
            &self,
            _candidate: &Candidate,
            job: &JobDocument,
            polarity: Polarity,
        ) -> std::result::Result<PartitionOutcome, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(job.id.as_str()) {
                return Err(JudgeError::Unavailable("rate limited".to_string()));
            }
            let label = match polarity {
                Polarity::Inclusion => "included",
                Polarity::Exclusion => "not excluded",
            };
            let mut entries = Map::new();
            entries.insert("0".to_string(), json!(["ok", [0], label]));
            Ok(PartitionOutcome::Assessed(entries))
        }
    }

    fn corpus() -> Corpus {
        Corpus::new(
            ["J1", "J2", "J3"]
                .iter()
                .map(|id| JobDocument {
                    id: id.to_string(),
                    title: String::new(),
                    text: String::new(),
                    metadata: JobMetadata::default(),
                })
                .collect(),
        )
    }

    fn plan(corpus: &Corpus) -> MatchPlan {
        let candidates = vec![Candidate::new("c1", "Cook.")];
        let retrieved = vec![(
            "c1".to_string(),
            vec!["J1".to_string(), "J2".to_string(), "J3".to_string()],
        )];
        MatchPlan::build(retrieved, &candidates, corpus, &TierBands::new(vec![1, 3]))
    }

    #[test]
    fn test_plan_skips_unknown_candidates() {
        let corpus = corpus();
        let plan = MatchPlan::build(
            vec![("ghost".to_string(), vec!["J1".to_string()])],
            &[Candidate::new("c1", "x")],
            &corpus,
            &TierBands::default(),
        );
        assert!(plan.candidates.is_empty());
        assert_eq!(plan.units(), 0);
    }

    #[tokio::test]
    async fn test_failed_units_are_retried() {
        let corpus = corpus();
        let plan = plan(&corpus);
        let store = MemoryStore::new();

        let flaky = ScriptedJudge {
            fail_on: Some("J2"),
            calls: AtomicUsize::new(0),
        };
        let summary = MatchingRunner::new(&flaky, &store, &corpus).run(&plan).await;
        assert_eq!(summary.computed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!store.exists(&UnitKey::matching("c1", "J2")).unwrap());

        let healthy = ScriptedJudge {
            fail_on: None,
            calls: AtomicUsize::new(0),
        };
        let summary = MatchingRunner::new(&healthy, &store, &corpus).run(&plan).await;
        assert_eq!(summary.computed, 1);
        assert_eq!(summary.skipped, 2);
        // Only J2 was judged, inclusion and exclusion
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_export_follows_plan_order() {
        let corpus = corpus();
        let plan = plan(&corpus);
        let store = MemoryStore::new();
        let judge = ScriptedJudge {
            fail_on: None,
            calls: AtomicUsize::new(0),
        };

        let runner = MatchingRunner::new(&judge, &store, &corpus);
        runner.run(&plan).await;
        let exported = runner.export(&plan).unwrap();

        let tiers = exported["c1"].as_object().unwrap();
        let labels: Vec<&String> = tiers.keys().collect();
        assert_eq!(labels, vec!["0", "1"]);
        let tier1: Vec<&String> = tiers["1"].as_object().unwrap().keys().collect();
        assert_eq!(tier1, vec!["J2", "J3"]);
        assert_eq!(
            tiers["0"]["J1"]["exclusion"]["0"],
            json!(["ok", [0], "not excluded"])
        );
    }
}
