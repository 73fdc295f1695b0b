//! Load configuration via `config` crate: a TOML file, overridden by `TRIGGER_PIPELINE_*` environment variables.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use super::types::Res;

/// Default Kafka security protocol.
fn default_security_protocol() -> String {
    "SASL_SSL".to_string()
}

/// Default SASL mechanism.
fn default_sasl_mechanism() -> String {
    "SCRAM-SHA-512".to_string()
}

/// Default topic holding incoming chat messages.
fn default_source_topic() -> String {
    "social-media-topic".to_string()
}

/// Default topic receiving aggregate results.
fn default_result_topic() -> String {
    "user-sentiment-topic".to_string()
}

/// Default consumer group for the live phase.
fn default_group_id() -> String {
    "bot-processor-group".to_string()
}

/// Default set of chats whose messages are processed.
fn default_watched_chat_ids() -> Vec<i64> {
    vec![-4714765877]
}

/// Default number of messages kept per user.
fn default_window_capacity() -> usize {
    10
}

/// Default marker that addresses the bot.
fn default_mention_marker() -> String {
    "@music_recommender_iss_bot".to_string()
}

/// Default idle window that ends the backfill phase.
fn default_backfill_idle_timeout_ms() -> u64 {
    1000
}

/// Default Google Translate v2 endpoint.
fn default_translate_endpoint() -> String {
    "https://translation.googleapis.com/language/translate/v2".to_string()
}

/// Default time to wait for a publish acknowledgment.
fn default_publish_timeout_ms() -> u64 {
    5000
}

/// Default time limit for one scoring or translation request.
fn default_request_timeout_ms() -> u64 {
    300_000
}

/// Configuration for the trigger pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Comma-separated bootstrap broker list (`BROKERS`).
    #[serde(default)]
    pub brokers: String,
    /// SASL principal (`SASL_USERNAME`).
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL secret (`SASL_PASSWORD`).
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Broker security protocol (`SECURITY_PROTOCOL`).
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    /// SASL mechanism (`SASL_MECHANISM`).
    #[serde(default = "default_sasl_mechanism")]
    pub sasl_mechanism: String,
    /// Topic to consume chat messages from (`SOURCE_TOPIC`).
    #[serde(default = "default_source_topic")]
    pub source_topic: String,
    /// Topic to publish aggregates to (`RESULT_TOPIC`).
    #[serde(default = "default_result_topic")]
    pub result_topic: String,
    /// Consumer group of the live phase (`GROUP_ID`).
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Chats whose messages are processed (`WATCHED_CHAT_IDS`, comma-separated).
    #[serde(default = "default_watched_chat_ids")]
    pub watched_chat_ids: Vec<i64>,
    /// Messages kept per user (`WINDOW_CAPACITY`).
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Substring that triggers scoring (`MENTION_MARKER`).
    #[serde(default = "default_mention_marker")]
    pub mention_marker: String,
    /// Backfill ends after a batch read waits this long with nothing to show (`BACKFILL_IDLE_TIMEOUT_MS`).
    ///
    /// This only means "caught up for now": the source stream is unbounded.
    #[serde(default = "default_backfill_idle_timeout_ms")]
    pub backfill_idle_timeout_ms: u64,
    /// Scoring service endpoint (`PREDICT_URL`).
    #[serde(default)]
    pub predict_url: String,
    /// Google Translate API key (`TRANSLATE_API_KEY`); translation is skipped when unset.
    #[serde(default)]
    pub translate_api_key: Option<String>,
    /// Google Translate v2 endpoint (`TRANSLATE_ENDPOINT`).
    #[serde(default = "default_translate_endpoint")]
    pub translate_endpoint: String,
    /// Cap on simultaneous translate+score calls per trigger (`SCORING_CONCURRENCY`).
    /// Unset means one call per buffered message, all at once.
    #[serde(default)]
    pub scoring_concurrency: Option<usize>,
    /// Publish acknowledgment timeout (`PUBLISH_TIMEOUT_MS`).
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// Time limit for one scoring or translation request (`REQUEST_TIMEOUT_MS`).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            sasl_username: None,
            sasl_password: None,
            security_protocol: default_security_protocol(),
            sasl_mechanism: default_sasl_mechanism(),
            source_topic: default_source_topic(),
            result_topic: default_result_topic(),
            group_id: default_group_id(),
            watched_chat_ids: default_watched_chat_ids(),
            window_capacity: default_window_capacity(),
            mention_marker: default_mention_marker(),
            backfill_idle_timeout_ms: default_backfill_idle_timeout_ms(),
            predict_url: String::new(),
            translate_api_key: None,
            translate_endpoint: default_translate_endpoint(),
            scoring_concurrency: None,
            publish_timeout_ms: default_publish_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConfigInner {
    /// The backfill idle window as a [`Duration`].
    pub fn backfill_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.backfill_idle_timeout_ms)
    }

    /// The publish acknowledgment timeout as a [`Duration`].
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    /// The per-request collaborator timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Loads the config file (explicit, or `.hidden/config.toml` when present), then
    /// applies `TRIGGER_PIPELINE_*` environment overrides.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        Self::load_with_env(explicit_path, config::Environment::default())
    }

    fn load_with_env(explicit_path: Option<&std::path::Path>, env: config::Environment) -> Res<Self> {
        let env = env
            .prefix("TRIGGER_PIPELINE")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("watched_chat_ids");

        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment goes last so it overrides the file.
        cfg = cfg.add_source(env);

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Res<()> {
        if self.window_capacity < 1 {
            return Err(anyhow::anyhow!("Window capacity must be at least 1."));
        }

        if self.watched_chat_ids.is_empty() {
            return Err(anyhow::anyhow!("At least one watched chat id is required."));
        }

        if self.mention_marker.is_empty() {
            return Err(anyhow::anyhow!("Mention marker must not be empty."));
        }

        if self.backfill_idle_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Backfill idle timeout must be greater than 0."));
        }

        if self.scoring_concurrency == Some(0) {
            return Err(anyhow::anyhow!("Scoring concurrency must be at least 1 when set."));
        }

        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than 0."));
        }

        if self.predict_url.trim().is_empty() {
            return Err(anyhow::anyhow!("A predict URL is required."));
        }

        Ok(())
    }
}

// Tests.
