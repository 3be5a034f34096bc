//! Result store for resumable batch stages
//!
//! A store holds one JSON payload per work unit and only supports
//! insert-if-absent writes, so re-running a stage can never alter a unit
//! that was already completed.

pub mod database;

use crate::error::{JobMatchError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

pub use database::{Database, DbPool};

/// Stage name for fused retrieval lists
pub const RETRIEVAL_STAGE: &str = "retrieval";

/// Stage name for criterion-level matching results
pub const MATCHING_STAGE: &str = "matching";

/// Identity of one work unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitKey {
    pub stage: String,
    pub candidate_id: String,
    /// Job id for matching units, parameter scope for retrieval units
    pub item: String,
}

impl UnitKey {
    pub fn new(
        stage: impl Into<String>,
        candidate_id: impl Into<String>,
        item: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            candidate_id: candidate_id.into(),
            item: item.into(),
        }
    }

    /// A candidate's fused list under one retrieval scope
    pub fn retrieval(candidate_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(RETRIEVAL_STAGE, candidate_id, scope)
    }

    pub fn matching(candidate_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self::new(MATCHING_STAGE, candidate_id, job_id)
    }
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.stage, self.candidate_id, self.item)
    }
}

/// Persistent get/put/exists over completed units
pub trait ResultStore: Send + Sync {
    fn get(&self, key: &UnitKey) -> Result<Option<Value>>;

    /// Insert `value` unless the unit already exists; returns whether it was
    /// inserted
    fn put(&self, key: &UnitKey, value: &Value) -> Result<bool>;

    fn exists(&self, key: &UnitKey) -> Result<bool>;
}

/// In-process store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    units: RwLock<HashMap<UnitKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.read().map(|units| units.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> JobMatchError {
    JobMatchError::Store("memory store lock poisoned".to_string())
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &UnitKey) -> Result<Option<Value>> {
        Ok(self.units.read().map_err(poisoned)?.get(key).cloned())
    }

    fn put(&self, key: &UnitKey, value: &Value) -> Result<bool> {
        let mut units = self.units.write().map_err(poisoned)?;
        if units.contains_key(key) {
            return Ok(false);
        }
        units.insert(key.clone(), value.clone());
        Ok(true)
    }

    fn exists(&self, key: &UnitKey) -> Result<bool> {
        Ok(self.units.read().map_err(poisoned)?.contains_key(key))
    }
}
