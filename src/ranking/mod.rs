//! Final ranking: matching score plus aggregation score, per candidate

mod aggregation;

pub use aggregation::{
    try_aggregation_score, AggregationIssue, ELIGIBILITY_FIELD, RELEVANCE_FIELD,
};

use crate::matching::matching_score_of_record;
use ahash::AHashSet;
use serde_json::{Map, Value};

/// One entry of a candidate's ranking
#[derive(Debug, Clone, PartialEq)]
pub struct RankedJob {
    pub job_id: String,
    pub score: f64,
}

impl RankedJob {
    /// Output form: `[job_id, score]`
    pub fn to_value(&self) -> Value {
        let score = serde_json::Number::from_f64(self.score)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        Value::Array(vec![Value::String(self.job_id.clone()), score])
    }
}

/// Counters from a ranking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankingSummary {
    pub candidates: usize,
    pub jobs: usize,
    /// Pairs whose aggregation score fell back to 0
    pub fallbacks: usize,
}

/// Sort by descending score, keeping input order among ties
pub fn sort_ranked(jobs: &mut [RankedJob]) {
    jobs.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Rank one candidate's judged jobs.
///
/// `tiers` is the candidate's tier -> job -> matching record map; jobs are
/// considered in the order they appear there. Only judged jobs are ranked.
pub fn rank_candidate(
    candidate_id: &str,
    tiers: &Map<String, Value>,
    aggregation: Option<&Map<String, Value>>,
    summary: &mut RankingSummary,
) -> Vec<RankedJob> {
    let mut ranked: Vec<RankedJob> = Vec::new();
    let mut seen = AHashSet::new();

    for (tier, jobs) in tiers {
        let Some(jobs) = jobs.as_object() else {
            tracing::warn!("Tier {} of candidate {} is not an object, skipping", tier, candidate_id);
            continue;
        };

        for (job_id, record) in jobs {
            if !seen.insert(job_id.as_str()) {
                tracing::warn!(
                    "Job {} appears in more than one tier for candidate {}, keeping the first",
                    job_id,
                    candidate_id
                );
                continue;
            }

            let matching = matching_score_of_record(record);
            if !record.is_object() {
                tracing::warn!(
                    "Matching result for {}/{} is an error sentinel, scoring it 0",
                    candidate_id,
                    job_id
                );
            }

            let agg = match try_aggregation_score(aggregation.and_then(|a| a.get(job_id))) {
                Ok(score) => score,
                Err(issue) => {
                    tracing::warn!(
                        "Aggregation score for {}/{} unavailable ({}), using 0",
                        candidate_id,
                        job_id,
                        issue
                    );
                    summary.fallbacks += 1;
                    0.0
                }
            };

            ranked.push(RankedJob {
                job_id: job_id.clone(),
                score: matching + agg,
            });
        }
    }

    sort_ranked(&mut ranked);
    summary.jobs += ranked.len();
    ranked
}

/// Rank every candidate in the matching export
pub fn rank_all(
    matching: &Map<String, Value>,
    aggregation: &Map<String, Value>,
) -> (Map<String, Value>, RankingSummary) {
    let mut summary = RankingSummary::default();
    let mut output = Map::new();

    for (candidate_id, tiers) in matching {
        let Some(tiers) = tiers.as_object() else {
            tracing::warn!("Matching results for candidate {} are not an object, skipping", candidate_id);
            continue;
        };

        let candidate_agg = aggregation.get(candidate_id).and_then(Value::as_object);
        let ranked = rank_candidate(candidate_id, tiers, candidate_agg, &mut summary);

        let entries = ranked.iter().map(RankedJob::to_value).collect();
        output.insert(candidate_id.clone(), Value::Array(entries));
        summary.candidates += 1;
    }

    tracing::info!(
        "Ranked {} jobs for {} candidates ({} aggregation fallbacks)",
        summary.jobs,
        summary.candidates,
        summary.fallbacks
    );

    (output, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn included(n: usize) -> Value {
        let entries: Map<String, Value> = (0..n)
            .map(|i| (i.to_string(), json!(["", [], "included"])))
            .collect();
        json!({"inclusion": entries, "exclusion": {}})
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let mut jobs = vec![
            RankedJob { job_id: "J1".into(), score: 0.8 },
            RankedJob { job_id: "J3".into(), score: 0.5 },
            RankedJob { job_id: "J2".into(), score: 0.8 },
        ];
        sort_ranked(&mut jobs);
        let order: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(order, vec!["J1", "J2", "J3"]);
    }

    #[test]
    fn test_ranked_job_output_pair() {
        let job = RankedJob { job_id: "J1".into(), score: 1.5 };
        assert_eq!(job.to_value(), json!(["J1", 1.5]));
    }

    #[test]
    fn test_combined_score_and_fallback() {
        let matching = json!({
            "c1": {
                "0": {"J1": included(2), "J2": included(1)},
                "1": {"J3": "matching result error"}
            }
        });
        let aggregation = json!({
            "c1": {
                "J1": {"relevance_score_R": 50, "eligibility_score_E": 50},
                "J2": {"relevance_score_R": "n/a"}
            }
        });

        let (ranked, summary) = rank_all(
            matching.as_object().unwrap(),
            aggregation.as_object().unwrap(),
        );

        let list = ranked["c1"].as_array().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0][0], "J1");
        assert!((list[0][1].as_f64().unwrap() - 2.0).abs() < 1e-6);
        // Malformed aggregation: ranked on matching score alone
        assert_eq!(list[1][0], "J2");
        assert!((list[1][1].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(list[2], json!(["J3", 0.0]));

        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.jobs, 3);
        assert_eq!(summary.fallbacks, 2);
    }

    #[test]
    fn test_unjudged_jobs_are_not_ranked() {
        let matching = json!({"c1": {"0": {}, "1": {"J5": included(1)}}});
        let aggregation = json!({"c1": {"J9": {"relevance_score_R": 90, "eligibility_score_E": 90}}});

        let (ranked, _) = rank_all(
            matching.as_object().unwrap(),
            aggregation.as_object().unwrap(),
        );
        assert_eq!(ranked["c1"].as_array().unwrap().len(), 1);
        assert_eq!(ranked["c1"][0][0], "J5");
    }
}
