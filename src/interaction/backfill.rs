//! Startup backfill of user histories from the retained log.
//!
//! The loader keeps issuing bounded-wait batch reads until one comes back
//! empty. That only means nothing arrived within the idle window: the log is
//! unbounded, so "caught up" is a liveness heuristic and records produced right
//! after the cut-off are left for the live phase.

use std::time::Duration;

use tracing::{info, instrument};

use crate::{
    base::types::{PipelineError, Res},
    interaction::{
        admission::{AdmissionRules, report},
        history::HistoryStore,
    },
    service::stream::{SourceRecord, StreamSource},
};

/// Counters describing one backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillStats {
    pub batches: usize,
    pub records: usize,
    pub admitted: usize,
    pub skipped: usize,
}

/// Loads today's messages from the retained log into a [`HistoryStore`].
pub struct BackfillLoader {
    rules: AdmissionRules,
    idle_timeout: Duration,
}

impl BackfillLoader {
    pub fn new(rules: AdmissionRules, idle_timeout: Duration) -> Self {
        Self { rules, idle_timeout }
    }

    /// Drain `source` into `history` until a batch read comes back empty.
    ///
    /// Bad records are logged and skipped; only a failing source stops the run early.
    #[instrument(name = "BackfillLoader::run", skip_all)]
    pub async fn run(&self, source: &StreamSource, history: &mut HistoryStore) -> Res<BackfillStats> {
        let mut stats = BackfillStats::default();

        loop {
            let batch = source.poll_batch(self.idle_timeout).await?;

            if batch.is_empty() {
                break;
            }

            stats.batches += 1;

            for record in &batch {
                stats.records += 1;

                match self.load_record(record, history) {
                    Ok(()) => stats.admitted += 1,
                    Err(e) => {
                        stats.skipped += 1;
                        report(record, &e);
                    }
                }
            }
        }

        info!(
            "History messages preloaded: {} admitted, {} skipped, {} users.",
            stats.admitted,
            stats.skipped,
            history.user_count()
        );

        Ok(stats)
    }

    /// Admit one record if it is valid and from today.
    pub fn load_record(&self, record: &SourceRecord, history: &mut HistoryStore) -> Result<(), PipelineError> {
        let message = self.rules.parse(record)?;

        if !self.rules.is_today(message.timestamp_ms) {
            return Err(PipelineError::FilteredOut("not from today".to_string()));
        }

        history.admit(&message.user_id, message.text);

        Ok(())
    }
}

// Tests.
