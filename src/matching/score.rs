//! Veto-adjusted matching score

use super::{CriteriaAssessment, ExclusionLabel, InclusionLabel};
use serde_json::Value;

/// Keeps the inclusion ratio finite when no criterion was decidable
pub const EPSILON: f64 = 1e-9;

/// Label tallies over the well-formed verdicts of one assessment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub included: usize,
    pub not_included: usize,
    pub inclusion_not_applicable: usize,
    pub inclusion_no_info: usize,
    pub excluded: usize,
    pub not_excluded: usize,
    pub exclusion_not_applicable: usize,
    pub exclusion_no_info: usize,
}

impl LabelCounts {
    pub fn tally(assessment: &CriteriaAssessment) -> Self {
        let mut counts = Self::default();

        for verdict in &assessment.inclusion.verdicts {
            match verdict.label {
                InclusionLabel::Included => counts.included += 1,
                InclusionLabel::NotIncluded => counts.not_included += 1,
                InclusionLabel::NotApplicable => counts.inclusion_not_applicable += 1,
                InclusionLabel::NotEnoughInformation => counts.inclusion_no_info += 1,
            }
        }

        for verdict in &assessment.exclusion.verdicts {
            match verdict.label {
                ExclusionLabel::Excluded => counts.excluded += 1,
                ExclusionLabel::NotExcluded => counts.not_excluded += 1,
                ExclusionLabel::NotApplicable => counts.exclusion_not_applicable += 1,
                ExclusionLabel::NotEnoughInformation => counts.exclusion_no_info += 1,
            }
        }

        counts
    }

    /// Fraction of decidable inclusion criteria that are met
    pub fn base(&self) -> f64 {
        let decidable = (self.included + self.not_included + self.inclusion_no_info) as f64;
        self.included as f64 / (decidable + EPSILON)
    }
}

/// `included / (included + not_included + no_info + ε)`, minus 1 for any
/// unmet inclusion criterion and minus 1 for any met exclusion criterion
pub fn matching_score(assessment: &CriteriaAssessment) -> f64 {
    let counts = LabelCounts::tally(assessment);

    let mut score = counts.base();

    if counts.not_included > 0 {
        score -= 1.0;
    }
    if counts.excluded > 0 {
        score -= 1.0;
    }

    score
}

/// Score a stored matching record; an error sentinel scores 0
pub fn matching_score_of_record(record: &Value) -> f64 {
    match CriteriaAssessment::from_value(record) {
        Some(assessment) => {
            if assessment.ignored() > 0 {
                tracing::debug!("Ignoring {} malformed verdict entries", assessment.ignored());
            }
            matching_score(&assessment)
        }
        None => 0.0,
    }
}
