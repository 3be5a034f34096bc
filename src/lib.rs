//! jobmatch - hybrid retrieval and criterion-level ranking of candidates
//! against job postings
//!
//! Each candidate's search conditions are run against a BM25 index and a
//! dense vector index of the job corpus, fused with weighted reciprocal rank
//! fusion, and grouped into tiers. An LLM judge then rates the candidate
//! against every inclusion and exclusion criterion of the retrieved jobs, with
//! results persisted so interrupted runs resume where they stopped. The final
//! ranking combines the criterion-level score with externally supplied
//! aggregation scores.

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod matching;
pub mod model;
pub mod ranking;
pub mod retrieval;
pub mod storage;

pub use error::{JobMatchError, Result};
