//! Resumable matching against the SQLite result store, then final ranking

use async_trait::async_trait;
use jobmatch::llm::{ChatCompletion, LlmError};
use jobmatch::matching::{LlmJudge, MatchPlan, MatchingRunner};
use jobmatch::model::{Candidate, Corpus, JobDocument, JobMetadata};
use jobmatch::ranking::rank_all;
use jobmatch::retrieval::TierBands;
use jobmatch::storage::{Database, ResultStore, UnitKey};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Canned model: J3 gets prose instead of JSON, J2 trips an exclusion.
/// Stops answering once `budget` calls have been made.
struct CannedModel {
    budget: usize,
    calls: AtomicUsize,
}

impl CannedModel {
    fn unlimited() -> Self {
        Self::with_budget(usize::MAX)
    }

    fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatCompletion for CannedModel {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.budget {
            return Err(LlmError::EmptyReply("quota exhausted".to_string()));
        }

        if user_prompt.contains("Title: Night baker") {
            return Ok("I'm sorry, I can't assess this candidate.".to_string());
        }

        let reply = if user_prompt.contains("Exclusion criteria:\n") {
            if user_prompt.contains("Title: Sous chef") {
                json!({"0": ["Candidate holds no food handler card", [2], "excluded"]})
            } else {
                json!({"0": ["Nothing disqualifying", [], "not excluded"]})
            }
        } else {
            json!({
                "0": ["Five years on the line", [0, 1], "included"],
                "1": ["No mention of inventory work", [], "not enough information"]
            })
        };

        Ok(format!("```json\n{}\n```", reply))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

fn job(id: &str, title: &str) -> JobDocument {
    JobDocument {
        id: id.to_string(),
        title: title.to_string(),
        text: String::new(),
        metadata: JobMetadata {
            title: title.to_string(),
            summary: "Kitchen role.".to_string(),
            inclusion_criteria: "Line cooking experience\n\nInventory management".to_string(),
            exclusion_criteria: "No valid food handler card".to_string(),
        },
    }
}

fn fixture() -> (Corpus, MatchPlan) {
    let corpus = Corpus::new(vec![
        job("J1", "Line cook"),
        job("J2", "Sous chef"),
        job("J3", "Night baker"),
        job("J4", "Prep cook"),
    ]);
    let candidates = vec![
        Candidate::new("c1", "I cooked for five years. I ran the grill station. My card expired."),
        Candidate::new("c2", "Barista for two years."),
    ];
    let retrieved = vec![
        (
            "c1".to_string(),
            vec!["J1".to_string(), "J2".to_string(), "J3".to_string(), "J9".to_string()],
        ),
        ("c2".to_string(), vec!["J4".to_string()]),
    ];
    let plan = MatchPlan::build(retrieved, &candidates, &corpus, &TierBands::new(vec![2, 4]));
    (corpus, plan)
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_same_export() {
    let temp = TempDir::new().unwrap();
    let (corpus, plan) = fixture();
    // Unknown job J9 is not planned
    assert_eq!(plan.units(), 4);

    // Reference: one uninterrupted run
    let reference_store = Database::new(&temp.path().join("reference.sqlite")).unwrap();
    let judge = LlmJudge::new(CannedModel::unlimited());
    let runner = MatchingRunner::new(&judge, &reference_store, &corpus);
    let summary = runner.run(&plan).await;
    assert_eq!(summary.computed, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.malformed, 2);
    let reference = runner.export(&plan).unwrap();

    // Interrupted after three model calls: J1 done, J2 half done
    let db_path = temp.path().join("results.sqlite");
    {
        let store = Database::new(&db_path).unwrap();
        let judge = LlmJudge::new(CannedModel::with_budget(3));
        let summary = MatchingRunner::new(&judge, &store, &corpus).run(&plan).await;
        assert_eq!(summary.computed, 1);
        assert_eq!(summary.failed, 3);
        // A unit whose second call failed leaves nothing behind
        assert!(!store.exists(&UnitKey::matching("c1", "J2")).unwrap());
    }
    println!("✓ First run stopped after one unit");

    let store = Database::new(&db_path).unwrap();
    let model = CannedModel::unlimited();
    let judge = LlmJudge::new(model);
    let runner = MatchingRunner::new(&judge, &store, &corpus);
    let summary = runner.run(&plan).await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.computed, 3);

    let resumed = runner.export(&plan).unwrap();
    assert_eq!(resumed, reference);
    assert_eq!(
        serde_json::to_string(&resumed).unwrap(),
        serde_json::to_string(&reference).unwrap()
    );
    println!("✓ Resumed export matches the uninterrupted run");

    // Third run computes nothing
    let summary = runner.run(&plan).await;
    assert_eq!(summary.computed, 0);
    assert_eq!(summary.skipped, 4);
}

#[tokio::test]
async fn test_export_shape_and_ranking() {
    let temp = TempDir::new().unwrap();
    let (corpus, plan) = fixture();
    let store = Database::new(&temp.path().join("results.sqlite")).unwrap();
    let judge = LlmJudge::new(CannedModel::unlimited());
    let runner = MatchingRunner::new(&judge, &store, &corpus);
    runner.run(&plan).await;

    let exported = runner.export(&plan).unwrap();

    let c1 = exported["c1"].as_object().unwrap();
    assert_eq!(c1.keys().collect::<Vec<_>>(), vec!["0", "1"]);
    assert_eq!(c1["0"].as_object().unwrap().keys().collect::<Vec<_>>(), vec!["J1", "J2"]);
    assert_eq!(c1["1"].as_object().unwrap().keys().collect::<Vec<_>>(), vec!["J3"]);
    // Prose reply kept verbatim in both partitions
    assert_eq!(
        c1["1"]["J3"]["inclusion"],
        json!("I'm sorry, I can't assess this candidate.")
    );
    assert_eq!(c1["0"]["J1"]["inclusion"]["0"][2], json!("included"));

    let c2 = exported["c2"].as_object().unwrap();
    assert_eq!(c2.keys().collect::<Vec<_>>(), vec!["0", "1"]);
    assert!(c2["1"].as_object().unwrap().is_empty());

    let aggregation: Map<String, Value> = serde_json::from_value(json!({
        "c1": {
            "J1": {"relevance_score_R": 80, "eligibility_score_E": 70},
            "J2": {"relevance_score_R": 95, "eligibility_score_E": 90},
            "J3": {"relevance_score_R": "90", "eligibility_score_E": "90"}
        }
    }))
    .unwrap();

    let (ranked, summary) = rank_all(&exported, &aggregation);
    let c1 = ranked["c1"].as_array().unwrap();

    // J1: 1/(1+1) + 1.5 = 2.0; J3: 0 + 1.8; J2: 0.5 - 1 + 1.85 = 1.35
    let order: Vec<&str> = c1.iter().map(|e| e[0].as_str().unwrap()).collect();
    assert_eq!(order, vec!["J1", "J3", "J2"]);
    assert!((c1[0][1].as_f64().unwrap() - 2.0).abs() < 1e-6);
    assert!((c1[2][1].as_f64().unwrap() - 1.35).abs() < 1e-6);

    // c2 has no aggregation entry: matching score only
    assert_eq!(ranked["c2"].as_array().unwrap().len(), 1);
    assert!((ranked["c2"][0][1].as_f64().unwrap() - 0.5).abs() < 1e-6);
    assert_eq!(summary.fallbacks, 1);
}
