//! Record parsing and the rules that decide what enters a user's history.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    base::{
        config::Config,
        types::{ChatMessage, PipelineError},
    },
    service::stream::SourceRecord,
};

/// Source of "now" for the same-day check.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Watched-chat filter plus the same-local-day admission rule.
#[derive(Clone)]
pub struct AdmissionRules {
    watched_chat_ids: HashSet<i64>,
    clock: Clock,
}

impl AdmissionRules {
    pub fn new(watched_chat_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            watched_chat_ids: watched_chat_ids.into_iter().collect(),
            clock: Arc::new(Local::now),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.watched_chat_ids.iter().copied())
    }

    /// Replaces the wall clock used for the same-day check.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn is_watched(&self, chat_id: i64) -> bool {
        self.watched_chat_ids.contains(&chat_id)
    }

    /// Decodes and validates a raw record.
    ///
    /// Fails with [`PipelineError::MalformedInput`] when the payload is not a
    /// JSON object or a required field is absent, and with
    /// [`PipelineError::FilteredOut`] when the chat is not watched or a field
    /// has the wrong type.
    pub fn parse(&self, record: &SourceRecord) -> Result<ChatMessage, PipelineError> {
        let payload = record
            .payload
            .as_deref()
            .ok_or_else(|| PipelineError::MalformedInput("empty payload".to_string()))?;

        let value: Value = serde_json::from_slice(payload).map_err(|e| PipelineError::MalformedInput(format!("not JSON: {e}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| PipelineError::MalformedInput("payload is not an object".to_string()))?;

        let chat_id = match present(object.get("chat_id")) {
            None => return Err(PipelineError::MalformedInput("missing `chat_id`".to_string())),
            Some(chat_id) => chat_id
                .as_i64()
                .ok_or_else(|| PipelineError::FilteredOut(format!("`chat_id` is not an integer: {chat_id}")))?,
        };

        if !self.is_watched(chat_id) {
            return Err(PipelineError::FilteredOut(format!("chat {chat_id} is not watched")));
        }

        let user_id = match present(object.get("user_id")) {
            None => return Err(PipelineError::MalformedInput("missing `user_id`".to_string())),
            Some(Value::String(user_id)) => user_id.clone(),
            Some(Value::Number(user_id)) if user_id.is_i64() || user_id.is_u64() => user_id.to_string(),
            Some(other) => return Err(PipelineError::FilteredOut(format!("`user_id` has unsupported type: {other}"))),
        };

        let text = match present(object.get("message")) {
            None => return Err(PipelineError::MalformedInput("missing `message`".to_string())),
            Some(Value::String(text)) => text.clone(),
            Some(_) => return Err(PipelineError::FilteredOut("`message` is not a string".to_string())),
        };

        Ok(ChatMessage {
            chat_id,
            user_id,
            text,
            timestamp_ms: record.timestamp_ms,
        })
    }

    /// Whether a broker timestamp falls on today's local calendar day.
    ///
    /// Records without a timestamp are never "today".
    pub fn is_today(&self, timestamp_ms: Option<i64>) -> bool {
        timestamp_ms.is_some_and(|ts| is_same_local_day(ts, (self.clock)()))
    }
}

/// Whether `timestamp_ms` and `now` share a local calendar day.
pub fn is_same_local_day(timestamp_ms: i64, now: DateTime<Local>) -> bool {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).date_naive() == now.date_naive())
        .unwrap_or(false)
}

/// Logs a record that was skipped or whose trigger was abandoned.
pub fn report(record: &SourceRecord, error: &PipelineError) {
    match error {
        PipelineError::MalformedInput(_) => warn!("Ignored record at partition {} offset {}: {}", record.partition, record.offset, error),
        PipelineError::FilteredOut(_) => debug!("Ignored record at partition {} offset {}: {}", record.partition, record.offset, error),
        PipelineError::CollaboratorFailure(_) | PipelineError::TransportFailure(_) => {
            error!("Trigger abandoned for record at partition {} offset {}: {}", record.partition, record.offset, error)
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

// Tests.
