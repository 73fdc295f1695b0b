//! Live tail of the chat stream.

use tracing::{info, instrument};

use crate::{
    base::types::{AggregateResult, PipelineError, Void},
    interaction::{
        admission::{AdmissionRules, report},
        history::HistoryStore,
        mention::contains_mention,
        trigger::TriggerPipeline,
    },
    service::stream::{SourceRecord, StreamSource},
};

/// Consumes new records one at a time, keeping histories current and firing
/// the trigger pipeline on mentions.
pub struct LiveProcessor {
    rules: AdmissionRules,
    pipeline: TriggerPipeline,
}

impl LiveProcessor {
    pub fn new(rules: AdmissionRules, pipeline: TriggerPipeline) -> Self {
        Self { rules, pipeline }
    }

    /// Process records until the source ends or fails.
    ///
    /// Per-record and per-trigger errors are logged and skipped; transport
    /// errors end the loop.
    #[instrument(name = "LiveProcessor::run", skip_all)]
    pub async fn run(&self, source: &StreamSource, history: &mut HistoryStore) -> Void {
        info!("Realtime consumer started, waiting for new messages ...");

        while let Some(record) = source.next_record().await? {
            match self.process_record(&record, history).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => report(&record, &e),
            }
        }

        info!("Source stream ended.");

        Ok(())
    }

    /// Admit the record when it is from today, then fire on a mention.
    ///
    /// Admission happens first, so a same-day mention is part of its own snapshot.
    /// The mention check does not depend on admission.
    pub async fn process_record(&self, record: &SourceRecord, history: &mut HistoryStore) -> Result<Option<AggregateResult>, PipelineError> {
        let message = self.rules.parse(record)?;

        if self.rules.is_today(message.timestamp_ms) {
            history.admit(&message.user_id, message.text.as_str());
        }

        if !contains_mention(&message.text, self.pipeline.marker()) {
            return Ok(None);
        }

        let result = self.pipeline.fire(&message.user_id, history).await?;

        Ok(Some(result))
    }
}

// Tests.
