//! Scores a user's buffered messages when the bot is mentioned.
//!
//! Each buffered text is cleaned, translated and scored as its own future; the
//! futures are joined and the first failure drops the rest. Aggregation only
//! happens after the join, so an abandoned trigger never publishes anything.

use futures::{StreamExt, TryStreamExt, future::try_join_all, stream};
use tracing::{debug, info, instrument};

use crate::{
    base::{
        config::Config,
        types::{AggregateResult, PipelineError, ScoreMap},
    },
    interaction::{history::HistoryStore, mention::strip_leading_mention},
    service::{scoring::ScoringClient, stream::StreamSink, translate::TranslationClient},
};

/// Fan-out/aggregate pipeline run once per trigger.
#[derive(Clone)]
pub struct TriggerPipeline {
    marker: String,
    translation: TranslationClient,
    scoring: ScoringClient,
    sink: StreamSink,
    concurrency: Option<usize>,
}

impl TriggerPipeline {
    pub fn new(marker: impl Into<String>, translation: TranslationClient, scoring: ScoringClient, sink: StreamSink) -> Self {
        Self {
            marker: marker.into(),
            translation,
            scoring,
            sink,
            concurrency: None,
        }
    }

    pub fn from_config(config: &Config, translation: TranslationClient, scoring: ScoringClient, sink: StreamSink) -> Self {
        Self::new(config.mention_marker.clone(), translation, scoring, sink).with_concurrency(config.scoring_concurrency)
    }

    /// Caps simultaneous translate+score calls; `None` runs them all at once.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit.filter(|limit| *limit > 0);
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Snapshot the user's window, score it, and publish the aggregate.
    #[instrument(name = "TriggerPipeline::fire", skip(self, history))]
    pub async fn fire(&self, user_id: &str, history: &HistoryStore) -> Result<AggregateResult, PipelineError> {
        let batch: Vec<String> = history
            .snapshot(user_id)
            .iter()
            .map(|text| strip_leading_mention(text, &self.marker).to_string())
            .collect();

        info!("Triggered by user `{}`, clean batch: {:?}", user_id, batch);

        let scores = self.score_all(batch).await?;
        let result = AggregateResult::from_scores(user_id, &scores).map_err(PipelineError::CollaboratorFailure)?;

        self.publish(&result).await?;

        info!("Sent aggregated result for user `{}`: {:?}", user_id, result.totals);

        Ok(result)
    }

    async fn score_all(&self, batch: Vec<String>) -> Result<Vec<ScoreMap>, PipelineError> {
        let calls = batch.into_iter().map(|text| self.score_one(text));

        match self.concurrency {
            None => try_join_all(calls).await,
            // Completion order, so a failure surfaces while earlier calls are still running.
            Some(limit) => stream::iter(calls).buffer_unordered(limit).try_collect().await,
        }
    }

    async fn score_one(&self, text: String) -> Result<ScoreMap, PipelineError> {
        let english = self.translation.to_english(&text).await.map_err(PipelineError::CollaboratorFailure)?;

        debug!("Scoring: {:?}", english);

        self.scoring.score(&english).await.map_err(PipelineError::CollaboratorFailure)
    }

    async fn publish(&self, result: &AggregateResult) -> Result<(), PipelineError> {
        let payload = serde_json::to_vec(result).map_err(|e| PipelineError::CollaboratorFailure(e.into()))?;

        self.sink.publish(&payload).await.map_err(PipelineError::TransportFailure)
    }
}

// Tests.
