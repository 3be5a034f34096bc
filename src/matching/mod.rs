//! Criterion-level eligibility matching
//!
//! Judge replies are kept verbatim in the result store. They are parsed into
//! typed verdicts, with one closed label set per polarity, only when scored;
//! entries that do not fit are counted and ignored.

mod judge;
mod prompt;
mod runner;
mod score;

pub use judge::{EligibilityJudge, JudgeError, LlmJudge, PartitionOutcome};
pub use prompt::{job_prompt, matching_prompts, numbered_criteria};
pub use runner::{MatchPlan, MatchingRunner, PlannedCandidate, RunSummary};
pub use score::{matching_score, matching_score_of_record, LabelCounts, EPSILON};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Which criteria block a verdict answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Inclusion,
    Exclusion,
}

impl Polarity {
    pub const ALL: [Polarity; 2] = [Polarity::Inclusion, Polarity::Exclusion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Inclusion => "inclusion",
            Polarity::Exclusion => "exclusion",
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InclusionLabel {
    #[serde(rename = "included")]
    Included,
    #[serde(rename = "not included")]
    NotIncluded,
    #[serde(rename = "not applicable")]
    NotApplicable,
    #[serde(rename = "not enough information")]
    NotEnoughInformation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExclusionLabel {
    #[serde(rename = "excluded")]
    Excluded,
    #[serde(rename = "not excluded")]
    NotExcluded,
    #[serde(rename = "not applicable")]
    NotApplicable,
    #[serde(rename = "not enough information")]
    NotEnoughInformation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for InclusionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "included" => Ok(Self::Included),
            "not included" => Ok(Self::NotIncluded),
            "not applicable" => Ok(Self::NotApplicable),
            "not enough information" => Ok(Self::NotEnoughInformation),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

impl FromStr for ExclusionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excluded" => Ok(Self::Excluded),
            "not excluded" => Ok(Self::NotExcluded),
            "not applicable" => Ok(Self::NotApplicable),
            "not enough information" => Ok(Self::NotEnoughInformation),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Judgment of one criterion: `[reasoning, [sentence ids], label]` on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionVerdict<L> {
    /// Criterion number as keyed by the judge
    pub criterion: String,
    pub reasoning: String,
    pub evidence: Vec<u32>,
    pub label: L,
}

impl<L: FromStr> CriterionVerdict<L> {
    /// Parse one entry; `None` on wrong arity or an unrecognized label
    pub fn from_entry(criterion: &str, entry: &Value) -> Option<Self> {
        let items = entry.as_array()?;
        if items.len() != 3 {
            return None;
        }

        let label = items[2].as_str()?.parse().ok()?;

        let reasoning = match &items[0] {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        // Evidence is informational; stray non-integer ids are skipped
        let evidence = items[1]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|id| u32::try_from(id).ok())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            criterion: criterion.to_string(),
            reasoning,
            evidence,
            label,
        })
    }
}

/// Verdicts of one partition plus how many entries were unusable
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<L> {
    pub verdicts: Vec<CriterionVerdict<L>>,
    pub ignored: usize,
    /// The judge reply was not a JSON object at all
    pub malformed: bool,
}

impl<L> Default for Partition<L> {
    fn default() -> Self {
        Self {
            verdicts: Vec::new(),
            ignored: 0,
            malformed: false,
        }
    }
}

impl<L: FromStr> Partition<L> {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(entries)) => Self::from_map(entries),
            Some(_) => Self {
                malformed: true,
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    pub fn from_map(entries: &Map<String, Value>) -> Self {
        let mut partition = Self::default();
        for (criterion, entry) in entries {
            match CriterionVerdict::from_entry(criterion, entry) {
                Some(verdict) => partition.verdicts.push(verdict),
                None => partition.ignored += 1,
            }
        }
        partition
    }
}

/// Both partitions for one (candidate, job) pair
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriteriaAssessment {
    pub inclusion: Partition<InclusionLabel>,
    pub exclusion: Partition<ExclusionLabel>,
}

impl CriteriaAssessment {
    /// Parse a stored record; `None` when the record is not an object
    /// (an error sentinel)
    pub fn from_value(record: &Value) -> Option<Self> {
        let record = record.as_object()?;
        Some(Self {
            inclusion: Partition::from_value(record.get(Polarity::Inclusion.as_str())),
            exclusion: Partition::from_value(record.get(Polarity::Exclusion.as_str())),
        })
    }

    pub fn ignored(&self) -> usize {
        self.inclusion.ignored + self.exclusion.ignored
    }
}
