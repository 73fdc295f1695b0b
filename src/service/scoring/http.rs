//! HTTP scoring client.
//!
//! POSTs `{"text": ...}` as JSON to the configured predict endpoint and reads
//! back a flat JSON object of numeric fields. Any non-2xx status, transport
//! error, timeout, or non-numeric field is a failure for that call. There are no retries.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{Res, ScoreMap, ScoreRequest},
};

use super::{GenericScoringClient, ScoringClient};

// Extra methods on `ScoringClient` applied by the http implementation.

impl ScoringClient {
    pub fn http(config: &Config) -> Res<Self> {
        let client = HttpScoringClient::new(&config.predict_url, config.request_timeout())?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Specific implementations.

/// Scoring client backed by a JSON-over-HTTP predict endpoint.
#[derive(Clone)]
pub struct HttpScoringClient {
    client: reqwest::Client,
    url: Url,
}

impl HttpScoringClient {
    /// Each request (connect, send, and read) is abandoned after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Res<Self> {
        let url = Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid predict URL `{}`: {}", url, e))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl GenericScoringClient for HttpScoringClient {
    #[instrument(name = "HttpScoringClient::score", skip_all)]
    async fn score(&self, text: &str) -> Res<ScoreMap> {
        let response = self.client.post(self.url.clone()).json(&ScoreRequest { text }).send().await?.error_for_status()?;

        let score: ScoreMap = response.json().await?;

        debug!("Prediction result: {:?}", score);

        Ok(score)
    }
}

// Tests.
