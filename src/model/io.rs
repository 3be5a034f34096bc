//! JSON / JSONL record loading and atomic JSON output

use super::{Candidate, ConditionList, Corpus, JobDocument};
use crate::error::{JobMatchError, Result};
use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| JobMatchError::Io {
        source: e,
        context: format!("Failed to read {}", path.display()),
    })
}

/// Parse a line-delimited JSON file, failing with the offending line number
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = read_to_string(path)?;
    let mut records = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = serde_json::from_str(line).map_err(|e| JobMatchError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Load the job corpus from a JSONL file
pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let jobs: Vec<JobDocument> = read_jsonl(path)?;
    let corpus = Corpus::new(jobs);
    tracing::info!("Loaded {} jobs from {}", corpus.len(), path.display());
    Ok(corpus)
}

#[derive(Debug, Deserialize)]
struct CandidateRecord {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    text: String,
}

/// Load candidates from a JSONL file, numbering their sentences
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let records: Vec<CandidateRecord> = read_jsonl(path)?;
    tracing::info!("Loaded {} candidates from {}", records.len(), path.display());
    Ok(records
        .into_iter()
        .map(|r| Candidate::new(r.id, r.text))
        .collect())
}

/// Load the condition lists for `query_type` from a candidate-keyed JSON file.
///
/// Each entry may be a plain string (one condition), an array of strings,
/// or an object carrying a `conditions` array and optional `summary`.
/// Entries of any other shape yield an empty list.
pub fn load_condition_lists(path: &Path, query_type: &str) -> Result<AHashMap<String, ConditionList>> {
    let root: serde_json::Map<String, Value> = read_json(path)?;
    let mut lists = AHashMap::with_capacity(root.len());

    for (candidate_id, entry) in root {
        let list = match entry.get(query_type) {
            Some(value) => condition_list_from_value(value),
            None => {
                tracing::warn!(
                    "Candidate {} has no '{}' conditions, using an empty list",
                    candidate_id,
                    query_type
                );
                ConditionList::default()
            }
        };
        lists.insert(candidate_id, list);
    }

    Ok(lists)
}

fn strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn condition_list_from_value(value: &Value) -> ConditionList {
    match value {
        Value::String(single) => ConditionList::new(vec![single.clone()]),
        Value::Array(items) => ConditionList::new(strings(items)),
        Value::Object(obj) => ConditionList {
            conditions: obj
                .get("conditions")
                .and_then(Value::as_array)
                .map(|items| strings(items))
                .unwrap_or_default(),
            summary: obj.get("summary").and_then(Value::as_str).map(str::to_string),
        },
        _ => ConditionList::default(),
    }
}

/// Read a whole JSON document
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| JobMatchError::Parse {
        path: path.to_path_buf(),
        line: e.line(),
        message: e.to_string(),
    })
}

/// Write pretty JSON through a temp file and rename
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| JobMatchError::Io {
            source: e,
            context: format!("Failed to create output directory: {}", parent.display()),
        })?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| JobMatchError::Json {
        source: e,
        context: format!("Failed to serialize {}", path.display()),
    })?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, content).map_err(|e| JobMatchError::Io {
        source: e,
        context: format!("Failed to write {}", temp_path.display()),
    })?;
    std::fs::rename(&temp_path, path).map_err(|e| JobMatchError::Io {
        source: e,
        context: format!(
            "Failed to move {} to {}",
            temp_path.display(),
            path.display()
        ),
    })?;

    Ok(())
}
