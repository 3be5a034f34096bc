//! Consumer of the externally produced aggregation scores

use serde_json::Value;
use thiserror::Error;

pub const RELEVANCE_FIELD: &str = "relevance_score_R";
pub const ELIGIBILITY_FIELD: &str = "eligibility_score_E";

/// Why an aggregation record fell back to 0
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationIssue {
    #[error("no aggregation record")]
    Missing,

    #[error("aggregation record is not an object")]
    NotAnObject,

    #[error("field {0} is missing")]
    MissingField(&'static str),

    #[error("field {0} is not a finite number")]
    NotNumeric(&'static str),
}

fn numeric_field(record: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64, AggregationIssue> {
    let value = record.get(field).ok_or(AggregationIssue::MissingField(field))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number
        .filter(|n| n.is_finite())
        .ok_or(AggregationIssue::NotNumeric(field))
}

/// `(relevance + eligibility) / 100`, or the reason it cannot be computed
pub fn try_aggregation_score(record: Option<&Value>) -> Result<f64, AggregationIssue> {
    let record = record
        .ok_or(AggregationIssue::Missing)?
        .as_object()
        .ok_or(AggregationIssue::NotAnObject)?;

    let relevance = numeric_field(record, RELEVANCE_FIELD)?;
    let eligibility = numeric_field(record, ELIGIBILITY_FIELD)?;

    Ok((relevance + eligibility) / 100.0)
}
