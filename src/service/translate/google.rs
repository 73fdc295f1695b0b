//! Google Cloud Translation (v2 REST) client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::base::{config::Config, types::Res};

use super::{GenericTranslationClient, TranslationClient};

/// Language code that needs no translation.
const ENGLISH: &str = "en";
/// Code Google returns when it cannot tell the language.
const UNDETERMINED: &str = "und";

// Extra methods on `TranslationClient` applied by the google implementation.

impl TranslationClient {
    /// Google Translate when an API key is configured; pass-through otherwise.
    pub fn google_or_passthrough(config: &Config) -> Res<Self> {
        match &config.translate_api_key {
            Some(key) if !key.is_empty() => {
                let client = GoogleTranslationClient::new(&config.translate_endpoint, key, config.request_timeout())?;
                Ok(Self { inner: Arc::new(client) })
            }
            _ => Ok(Self::passthrough()),
        }
    }
}

// Specific implementations.

/// Google Translate client.
#[derive(Clone)]
pub struct GoogleTranslationClient {
    client: reqwest::Client,
    detect_url: Url,
    translate_url: Url,
    api_key: String,
}

impl GoogleTranslationClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Res<Self> {
        let base = endpoint.trim_end_matches('/');

        let translate_url = Url::parse(base).map_err(|e| anyhow::anyhow!("Invalid translate endpoint `{}`: {}", endpoint, e))?;
        let detect_url = Url::parse(&format!("{base}/detect"))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            detect_url,
            translate_url,
            api_key: api_key.to_string(),
        })
    }

    async fn post(&self, url: &Url, body: Value) -> Res<Value> {
        let response = self
            .client
            .post(url.clone())
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Detected language code, or `None` when Google could not tell.
    async fn detect_language(&self, text: &str) -> Res<Option<String>> {
        let body = self.post(&self.detect_url, json!({ "q": text })).await?;
        Ok(detected_language(&body))
    }
}

#[async_trait]
impl GenericTranslationClient for GoogleTranslationClient {
    #[instrument(name = "GoogleTranslationClient::to_english", skip_all)]
    async fn to_english(&self, text: &str) -> Res<String> {
        let Some(language) = self.detect_language(text).await? else {
            return Ok(text.to_string());
        };

        if language == ENGLISH {
            return Ok(text.to_string());
        }

        debug!("Translating from `{}`.", language);

        let body = self
            .post(&self.translate_url, json!({ "q": text, "target": ENGLISH, "format": "text" }))
            .await?;

        Ok(translated_text(&body).unwrap_or_else(|| text.to_string()))
    }
}

// Helpers.

fn detected_language(body: &Value) -> Option<String> {
    body.pointer("/data/detections/0/0/language")
        .and_then(Value::as_str)
        .filter(|language| !language.is_empty() && *language != UNDETERMINED)
        .map(str::to_string)
}

fn translated_text(body: &Value) -> Option<String> {
    body.pointer("/data/translations/0/translatedText").and_then(Value::as_str).map(str::to_string)
}

// Tests.
