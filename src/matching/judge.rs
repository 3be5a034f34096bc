//! The eligibility judge seam and its LLM-backed implementation

use super::prompt::matching_prompts;
use super::{Partition, Polarity};
use crate::llm::{strip_code_fences, ChatCompletion, LlmError};
use crate::model::{Candidate, JobDocument};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// External-call failure; the unit stays uncomputed and is retried next run
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Judge unavailable: {0}")]
    Unavailable(String),
}

/// What the judge returned for one partition
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionOutcome {
    /// Criterion number -> `[reasoning, [sentence ids], label]`
    Assessed(Map<String, Value>),
    /// Reply that was not a JSON object, kept verbatim
    Malformed(String),
}

impl PartitionOutcome {
    /// Interpret a raw judge reply
    pub fn from_reply(reply: &str) -> Self {
        let body = strip_code_fences(reply);
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(entries)) => Self::Assessed(entries),
            _ => Self::Malformed(body.to_string()),
        }
    }

    /// Stored form: the verdict object, or the raw reply string
    pub fn into_value(self) -> Value {
        match self {
            Self::Assessed(entries) => Value::Object(entries),
            Self::Malformed(raw) => Value::String(raw),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Produces per-criterion verdicts for one polarity of one job
#[async_trait]
pub trait EligibilityJudge: Send + Sync {
    async fn evaluate(
        &self,
        candidate: &Candidate,
        job: &JobDocument,
        polarity: Polarity,
    ) -> Result<PartitionOutcome, JudgeError>;
}

/// Judge that prompts a chat-completion model
pub struct LlmJudge<C> {
    client: C,
}

impl<C: ChatCompletion> LlmJudge<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ChatCompletion> EligibilityJudge for LlmJudge<C> {
    async fn evaluate(
        &self,
        candidate: &Candidate,
        job: &JobDocument,
        polarity: Polarity,
    ) -> Result<PartitionOutcome, JudgeError> {
        let (system_prompt, user_prompt) = matching_prompts(candidate, job, polarity);
        let reply = self.client.complete(&system_prompt, &user_prompt).await?;
        let outcome = PartitionOutcome::from_reply(&reply);

        match &outcome {
            PartitionOutcome::Assessed(entries) => {
                let ignored = match polarity {
                    Polarity::Inclusion => Partition::<super::InclusionLabel>::from_map(entries).ignored,
                    Polarity::Exclusion => Partition::<super::ExclusionLabel>::from_map(entries).ignored,
                };
                if ignored > 0 {
                    tracing::warn!(
                        "{} of {} {} verdicts for {}/{} are malformed and will not be scored",
                        ignored,
                        entries.len(),
                        polarity,
                        candidate.id,
                        job.id
                    );
                }
            }
            PartitionOutcome::Malformed(_) => {
                tracing::warn!(
                    "Unparsable {} reply from {} for {}/{}, storing it verbatim",
                    polarity,
                    self.client.model_name(),
                    candidate.id,
                    job.id
                );
            }
        }

        Ok(outcome)
    }
}
