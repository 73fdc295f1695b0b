//! Runtime services and process lifecycle for the trigger pipeline.
//!
//! The process moves through `Init → Backfill → Live → Stopped`. Whatever ends
//! the live phase (shutdown signal, end of stream, or a transport error), every
//! connection is closed before [`Runtime::run_until`] returns.

use std::fmt;

use tracing::{error, info, instrument, warn};

use crate::{
    base::{config::Config, types::Void},
    interaction::{admission::AdmissionRules, backfill::BackfillLoader, history::HistoryStore, live::LiveProcessor, trigger::TriggerPipeline},
    service::{
        scoring::ScoringClient,
        stream::{StreamSink, StreamSource},
        translate::TranslationClient,
    },
};

#[cfg(feature = "kafka")]
use crate::base::types::Res;

/// Lifecycle phase of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Backfill,
    Live,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::Backfill => "BACKFILL",
            Phase::Live => "LIVE",
            Phase::Stopped => "STOPPED",
        };

        f.write_str(name)
    }
}

fn enter(phase: Phase) {
    info!("Entering {} phase.", phase);
}

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, both stream consumers, the result sink,
/// and the scoring and translation clients. It is designed to be trivially
/// cloneable, allowing it to be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// Consumer that replays the retained log at startup.
    pub backfill_source: StreamSource,
    /// Consumer that tails new records.
    pub live_source: StreamSource,
    /// Producer for aggregate records.
    pub sink: StreamSink,
    /// The scoring client instance.
    pub scoring: ScoringClient,
    /// The translation client instance.
    pub translation: TranslationClient,
}

impl Runtime {
    /// Create a new runtime instance backed by Kafka.
    #[cfg(feature = "kafka")]
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        enter(Phase::Init);

        // Initialize the collaborators.
        let scoring = ScoringClient::http(&config)?;
        let translation = TranslationClient::google_or_passthrough(&config)?;

        // Initialize the stream connections.
        let backfill_source = StreamSource::kafka_backfill(&config)?;
        let live_source = StreamSource::kafka_live(&config)?;
        let sink = StreamSink::kafka(&config)?;

        Ok(Self {
            config,
            backfill_source,
            live_source,
            sink,
            scoring,
            translation,
        })
    }

    /// Run until Ctrl-C, the end of the live stream, or a transport failure.
    pub async fn start(&self) -> Void {
        self.run_until(shutdown_signal()).await
    }

    /// Run both phases until `shutdown` resolves or the live phase ends, then release every connection.
    #[instrument(skip_all)]
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Void {
        let mut history = HistoryStore::new(self.config.window_capacity);

        let result = tokio::select! {
            result = self.run_phases(&mut history) => result,
            _ = shutdown => {
                info!("Shutdown requested.");
                Ok(())
            }
        };

        if let Err(e) = &result {
            error!("Stopping after transport failure: {:#}", e);
        }

        enter(Phase::Stopped);
        self.release().await;

        result
    }

    async fn run_phases(&self, history: &mut HistoryStore) -> Void {
        let rules = AdmissionRules::from_config(&self.config);

        // Backfill.

        enter(Phase::Backfill);

        let loader = BackfillLoader::new(rules.clone(), self.config.backfill_idle_timeout());
        let stats = loader.run(&self.backfill_source, history).await;

        if let Err(e) = self.backfill_source.close().await {
            warn!("Failed to close the backfill consumer: {:#}", e);
        }

        stats?;

        // Live.

        enter(Phase::Live);

        let pipeline = TriggerPipeline::from_config(&self.config, self.translation.clone(), self.scoring.clone(), self.sink.clone());
        let live = LiveProcessor::new(rules, pipeline);

        live.run(&self.live_source, history).await
    }

    /// Close every stream connection, logging (not returning) failures.
    async fn release(&self) {
        if let Err(e) = self.backfill_source.close().await {
            warn!("Failed to close the backfill consumer: {:#}", e);
        }

        if let Err(e) = self.live_source.close().await {
            warn!("Failed to close the live consumer: {:#}", e);
        }

        if let Err(e) = self.sink.close().await {
            warn!("Failed to close the producer: {:#}", e);
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the signal handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use async_trait::async_trait;
    use chrono::Local;
    use serde_json::json;

    use super::*;
    use crate::{
        base::{
            config::ConfigInner,
            types::{Res, ScoreMap},
        },
        service::{scoring::GenericScoringClient, stream::memory::MemoryStreamSink},
    };

    struct OneScorer;

    #[async_trait]
    impl GenericScoringClient for OneScorer {
        async fn score(&self, _text: &str) -> Res<ScoreMap> {
            Ok(BTreeMap::from([("count".to_string(), serde_json::Number::from(1))]))
        }
    }

    fn config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                watched_chat_ids: vec![1],
                backfill_idle_timeout_ms: 20,
                predict_url: "http://localhost/predict".to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Init.to_string(), "INIT");
        assert_eq!(Phase::Stopped.to_string(), "STOPPED");
    }

    #[tokio::test]
    async fn test_backfilled_history_feeds_live_triggers_and_connections_are_released() {
        let now = Some(Local::now().timestamp_millis());

        let (backfill_writer, backfill_source) = StreamSource::memory();
        backfill_writer.push_json(&json!({ "chat_id": 1, "user_id": 9, "message": "from backlog" }), now).unwrap();
        drop(backfill_writer);

        let (live_writer, live_source) = StreamSource::memory();
        live_writer
            .push_json(&json!({ "chat_id": 1, "user_id": 9, "message": "@music_recommender_iss_bot hi" }), now)
            .unwrap();
        drop(live_writer);

        let sink = Arc::new(MemoryStreamSink::default());
        let runtime = Runtime {
            config: config(),
            backfill_source,
            live_source,
            sink: StreamSink::memory(sink.clone()),
            scoring: ScoringClient::new(Arc::new(OneScorer)),
            translation: TranslationClient::passthrough(),
        };

        runtime.run_until(std::future::pending()).await.unwrap();

        assert_eq!(sink.published_json().await.unwrap(), vec![json!({ "count": 2, "user_id": "9" })]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_the_live_phase_and_releases() {
        let (backfill_writer, backfill_source) = StreamSource::memory();
        drop(backfill_writer);

        // Kept alive so the live phase would wait forever.
        let (_live_writer, live_source) = StreamSource::memory();

        let sink = Arc::new(MemoryStreamSink::default());
        let runtime = Runtime {
            config: config(),
            backfill_source,
            live_source,
            sink: StreamSink::memory(sink.clone()),
            scoring: ScoringClient::new(Arc::new(OneScorer)),
            translation: TranslationClient::passthrough(),
        };

        runtime
            .run_until(tokio::time::sleep(std::time::Duration::from_millis(50)))
            .await
            .unwrap();

        assert!(sink.is_closed());
        assert!(sink.published().await.is_empty());
    }
}
