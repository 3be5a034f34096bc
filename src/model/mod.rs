//! Core records: job postings, candidates and their search conditions
//!
//! Everything here is immutable once loaded. Job ids are unique within a
//! corpus and candidate sentence ids are fixed the moment a `Candidate`
//! is constructed.

mod criteria;
mod io;
mod sentences;

pub use criteria::parse_criteria;
pub use io::{load_candidates, load_condition_lists, load_corpus, read_json, write_json};
pub use sentences::{split_sentences, CONSENT_SENTENCE};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Metadata attached to a job posting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, alias = "brief_title")]
    pub title: String,

    /// One-paragraph summary of the role
    #[serde(default, alias = "brief_summary")]
    pub summary: String,

    /// Inclusion criteria, separated by blank lines
    #[serde(default)]
    pub inclusion_criteria: String,

    /// Exclusion criteria, separated by blank lines
    #[serde(default)]
    pub exclusion_criteria: String,
}

/// A job posting as ingested from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDocument {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Free-text body
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub metadata: JobMetadata,
}

impl JobDocument {
    /// Title shown to the judge, preferring the metadata title when present
    pub fn display_title(&self) -> &str {
        if self.metadata.title.is_empty() {
            &self.title
        } else {
            &self.metadata.title
        }
    }
}

/// Job postings in corpus order, addressable by id
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    jobs: Vec<JobDocument>,
    positions: AHashMap<String, usize>,
}

impl Corpus {
    /// Build a corpus, keeping the first occurrence of any duplicated id
    pub fn new(jobs: Vec<JobDocument>) -> Self {
        let mut kept = Vec::with_capacity(jobs.len());
        let mut positions = AHashMap::with_capacity(jobs.len());

        for job in jobs {
            if positions.contains_key(&job.id) {
                tracing::warn!("Duplicate job id {} in corpus, keeping first occurrence", job.id);
                continue;
            }
            positions.insert(job.id.clone(), kept.len());
            kept.push(job);
        }

        Self {
            jobs: kept,
            positions,
        }
    }

    pub fn get(&self, id: &str) -> Option<&JobDocument> {
        self.positions.get(id).map(|&pos| &self.jobs[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Job ids in corpus order
    pub fn ids(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.id.clone()).collect()
    }

    pub fn jobs(&self) -> &[JobDocument] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// A numbered resume sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: u32,
    pub text: String,
}

/// A candidate (resume) with stable sentence numbering
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    sentences: Vec<Sentence>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let sentences = split_sentences(&text)
            .into_iter()
            .chain(std::iter::once(CONSENT_SENTENCE.to_string()))
            .enumerate()
            .map(|(idx, text)| Sentence {
                id: idx as u32,
                text,
            })
            .collect();

        Self {
            id: id.into(),
            text,
            sentences,
        }
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Resume rendered as `"<id>. <sentence>"` lines
    pub fn numbered_text(&self) -> String {
        self.sentences
            .iter()
            .map(|s| format!("{}. {}", s.id, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Priority-ranked search phrases for one candidate (index 0 = highest)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionList {
    pub conditions: Vec<String>,

    /// Free-text summary, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ConditionList {
    pub fn new(conditions: Vec<String>) -> Self {
        Self {
            conditions,
            summary: None,
        }
    }

    /// Keep only the `max` highest-priority conditions
    pub fn truncated(mut self, max: usize) -> Self {
        if self.conditions.len() > max {
            tracing::debug!(
                "Truncating condition list from {} to {} entries",
                self.conditions.len(),
                max
            );
            self.conditions.truncate(max);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, title: &str) -> JobDocument {
        JobDocument {
            id: id.to_string(),
            title: title.to_string(),
            text: String::new(),
            metadata: JobMetadata::default(),
        }
    }

    #[test]
    fn test_corpus_drops_duplicate_ids() {
        let corpus = Corpus::new(vec![job("a", "first"), job("b", "other"), job("a", "second")]);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(corpus.get("a").unwrap().title, "first");
    }

    #[test]
    fn test_candidate_sentence_ids_are_stable() {
        let candidate = Candidate::new("c1", "Built APIs in Rust. Led a team of five!");
        let ids: Vec<u32> = candidate.sentences().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(candidate.sentences()[2].text, CONSENT_SENTENCE);

        let again = Candidate::new("c1", "Built APIs in Rust. Led a team of five!");
        assert_eq!(candidate, again);
    }

    #[test]
    fn test_numbered_text() {
        let candidate = Candidate::new("c1", "Knows SQL.");
        let rendered = candidate.numbered_text();
        assert!(rendered.starts_with("0. Knows SQL."));
        assert!(rendered.contains(&format!("1. {}", CONSENT_SENTENCE)));
    }

    #[test]
    fn test_metadata_aliases() {
        let raw = r#"{"_id": "J1", "title": "Dev", "text": "body",
            "metadata": {"brief_title": "Developer", "brief_summary": "Writes code"}}"#;
        let job: JobDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id, "J1");
        assert_eq!(job.display_title(), "Developer");
        assert_eq!(job.metadata.summary, "Writes code");
        assert!(job.metadata.inclusion_criteria.is_empty());
    }
}
