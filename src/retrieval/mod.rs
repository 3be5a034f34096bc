//! Hybrid retrieval and fusion
//!
//! Each condition in a candidate's priority-ranked list is searched against
//! the sparse and dense indices, and the per-modality rankings are merged
//! with a condition-weighted reciprocal rank fusion. Fused lists are persisted
//! per candidate so an interrupted run picks up where it stopped.

mod fusion;
mod hybrid;
mod runner;
mod tiers;

pub use fusion::{FusedHit, FusionAccumulator, FusionError, FusionParams};
pub use hybrid::{DenseSource, HybridRetriever, Modality, RankedSource, RetrievalOutcome, SearchError};
pub use runner::{retrieval_scope, RetrievalRunner, RetrievalSummary};
pub use tiers::{Tier, TierBands};
