use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Numeric fields returned by the scoring service for one message.
///
/// Values keep their JSON form, so integer scores stay integers.
pub type ScoreMap = BTreeMap<String, Number>;

/// A validated chat message, extracted from a raw stream record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub chat_id: i64,
    /// Integer ids are normalized to their decimal form.
    pub user_id: String,
    pub text: String,
    /// Broker-assigned timestamp (ms since epoch), if the transport provided one.
    pub timestamp_ms: Option<i64>,
}

/// Request body sent to the scoring service.
#[derive(Debug, Serialize)]
pub struct ScoreRequest<'a> {
    pub text: &'a str,
}

/// One aggregate record per trigger: every score field summed across the
/// user's buffered messages, plus the user that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(flatten)]
    pub totals: ScoreMap,
    pub user_id: String,
}

impl AggregateResult {
    /// Sums every field over the union of field names in `scores`.
    ///
    /// Fails only when a float sum is no longer finite.
    pub fn from_scores<'a>(user_id: &str, scores: impl IntoIterator<Item = &'a ScoreMap>) -> Res<Self> {
        let mut totals = ScoreMap::new();

        for score in scores {
            for (field, value) in score {
                let total = match totals.get(field) {
                    Some(total) => add_numbers(total, value).ok_or_else(|| anyhow::anyhow!("Sum of `{}` is not finite.", field))?,
                    None => value.clone(),
                };

                totals.insert(field.clone(), total);
            }
        }

        // The attached id always wins over a scored field of the same name.
        totals.remove("user_id");

        Ok(Self {
            totals,
            user_id: user_id.to_string(),
        })
    }
}

/// Adds two JSON numbers, staying in integers while both sides are integers and
/// the sum fits.
fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }

    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }

    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

/// Typed outcome of processing one record or one trigger.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Payload is not structured data, or lacks a required field.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// Well-formed, but outside the watched scope or carrying a wrongly typed field.
    #[error("filtered out: {0}")]
    FilteredOut(String),
    /// The translation or scoring service failed; only the current trigger is lost.
    #[error("collaborator failure: {0:#}")]
    CollaboratorFailure(anyhow::Error),
    /// The stream transport failed; fatal to the running phase.
    #[error("transport failure: {0:#}")]
    TransportFailure(anyhow::Error),
}

impl PipelineError {
    /// Whether this error must stop the consume loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::TransportFailure(_))
    }
}

// Tests.
