#![cfg(test)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Local;
use mockall::mock;
use serde_json::json;
use trigger_pipeline::{
    base::{
        config::{Config, ConfigInner},
        types::{Res, ScoreMap},
    },
    runtime::Runtime,
    service::{
        scoring::{GenericScoringClient, ScoringClient},
        stream::{StreamSink, StreamSource, memory::MemoryStreamSink, memory::MemoryStreamWriter},
        translate::{GenericTranslationClient, TranslationClient},
    },
};

const CHAT: i64 = -4714765877;

// Mocks.

mock! {
    pub Scorer {}

    #[async_trait]
    impl GenericScoringClient for Scorer {
        async fn score(&self, text: &str) -> Res<ScoreMap>;
    }
}

mock! {
    pub Translator {}

    #[async_trait]
    impl GenericTranslationClient for Translator {
        async fn to_english(&self, text: &str) -> Res<String>;
    }
}

/// Scorer that records every text and returns `{"pos": 1}` (plus `{"mention": 1}` for "rate these").
fn get_recording_scorer(seen: Arc<Mutex<Vec<String>>>) -> MockScorer {
    let mut mock = MockScorer::new();

    mock.expect_score().returning(move |text| {
        seen.lock().unwrap().push(text.to_string());

        if text.contains("fail") {
            return Err(anyhow::anyhow!("prediction service returned 500"));
        }

        let mut score = BTreeMap::from([("pos".to_string(), serde_json::Number::from(1))]);
        if text == "rate these" {
            score.insert("mention".to_string(), serde_json::Number::from(1));
        }

        Ok(score)
    });

    mock
}

fn get_passthrough_translator() -> MockTranslator {
    let mut mock = MockTranslator::new();

    mock.expect_to_english().returning(|text| Ok(text.to_string()));

    mock
}

/// Helper function to setup the test environment.
///
/// Returns the runtime, the writers feeding both phases, and the sink that collects output.
fn setup_test_environment(scorer: MockScorer, translator: MockTranslator) -> (Runtime, MemoryStreamWriter, MemoryStreamWriter, Arc<MemoryStreamSink>) {
    let config = Config {
        inner: Arc::new(ConfigInner {
            watched_chat_ids: vec![CHAT],
            backfill_idle_timeout_ms: 20,
            predict_url: "http://localhost:8000/predict".to_string(),
            ..Default::default()
        }),
    };

    let (backfill_writer, backfill_source) = StreamSource::memory();
    let (live_writer, live_source) = StreamSource::memory();
    let sink = Arc::new(MemoryStreamSink::default());

    let runtime = Runtime {
        config,
        backfill_source,
        live_source,
        sink: StreamSink::memory(sink.clone()),
        scoring: ScoringClient::new(Arc::new(scorer)),
        translation: TranslationClient::new(Arc::new(translator)),
    };

    (runtime, backfill_writer, live_writer, sink)
}

fn now_ms() -> Option<i64> {
    Some(Local::now().timestamp_millis())
}

fn days_ago_ms(days: i64) -> Option<i64> {
    Some((Local::now() - chrono::Duration::days(days)).timestamp_millis())
}

#[tokio::test]
async fn test_end_to_end_window_eviction_and_trigger() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(get_recording_scorer(seen.clone()), get_passthrough_translator());
    drop(backfill_writer);

    // 11 plain messages: the 11th evicts the 1st.
    for i in 1..=11 {
        live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": "42", "message": format!("m{i}") }), now_ms()).unwrap();
    }

    // The mention is admitted before the trigger fires, evicting m2.
    live_writer
        .push_json(&json!({ "chat_id": CHAT, "user_id": "42", "message": "@music_recommender_iss_bot rate these" }), now_ms())
        .unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    let mut scored = seen.lock().unwrap().clone();
    scored.sort();

    let mut expected: Vec<String> = (3..=11).map(|i| format!("m{i}")).collect();
    expected.push("rate these".to_string());
    expected.sort();

    assert_eq!(scored, expected);
    assert_eq!(sink.published_json().await.unwrap(), vec![json!({ "pos": 10, "mention": 1, "user_id": "42" })]);
}

#[tokio::test]
async fn test_backfill_then_live_mention_from_yesterday_still_triggers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(get_recording_scorer(seen.clone()), get_passthrough_translator());

    // Backlog: one message from today, one from two days ago, one garbage record.
    backfill_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 7, "message": "today" }), now_ms()).unwrap();
    backfill_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 7, "message": "stale" }), days_ago_ms(2)).unwrap();
    backfill_writer.push("\u{0}\u{1}", now_ms()).unwrap();
    drop(backfill_writer);

    // Stale mention: not admitted, but still triggers on the backfilled window.
    live_writer
        .push_json(&json!({ "chat_id": CHAT, "user_id": 7, "message": "@music_recommender_iss_bot again" }), days_ago_ms(2))
        .unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["today".to_string()]);
    assert_eq!(sink.published_json().await.unwrap(), vec![json!({ "pos": 1, "user_id": "7" })]);
}

#[tokio::test]
async fn test_failed_scoring_call_drops_only_that_trigger() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(get_recording_scorer(seen.clone()), get_passthrough_translator());
    drop(backfill_writer);

    for text in ["one", "this will fail", "three"] {
        live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 1, "message": text }), now_ms()).unwrap();
    }
    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 1, "message": "@music_recommender_iss_bot" }), now_ms()).unwrap();

    // A later trigger by another user is unaffected.
    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 2, "message": "fine" }), now_ms()).unwrap();
    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 2, "message": "@music_recommender_iss_bot" }), now_ms()).unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    assert_eq!(sink.published_json().await.unwrap(), vec![json!({ "pos": 2, "user_id": "2" })]);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn test_unwatched_and_malformed_records_never_reach_scoring() {
    let mut scorer = MockScorer::new();
    scorer.expect_score().never();

    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(scorer, get_passthrough_translator());
    drop(backfill_writer);

    live_writer.push_json(&json!({ "chat_id": 1, "user_id": 1, "message": "@music_recommender_iss_bot" }), now_ms()).unwrap();
    live_writer.push_json(&json!({ "chat_id": CHAT, "message": "@music_recommender_iss_bot" }), now_ms()).unwrap();
    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 1, "message": 12 }), now_ms()).unwrap();
    live_writer.push("@music_recommender_iss_bot", now_ms()).unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    assert!(sink.published().await.is_empty());
}

#[tokio::test]
async fn test_non_english_text_is_translated_before_scoring() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut translator = MockTranslator::new();
    translator
        .expect_to_english()
        .returning(|text| Ok(if text == "hola" { "hello".to_string() } else { text.to_string() }));

    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(get_recording_scorer(seen.clone()), translator);
    drop(backfill_writer);

    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 3, "message": "hola" }), now_ms()).unwrap();
    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 3, "message": "hey @music_recommender_iss_bot" }), now_ms()).unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    let mut scored = seen.lock().unwrap().clone();
    scored.sort();

    assert_eq!(scored, vec!["hello".to_string(), "hey @music_recommender_iss_bot".to_string()]);
    assert_eq!(sink.published().await.len(), 1);
}

#[tokio::test]
async fn test_translation_failure_abandons_trigger() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut translator = MockTranslator::new();
    translator.expect_to_english().returning(|_| Err(anyhow::anyhow!("quota exceeded")));

    let (runtime, backfill_writer, live_writer, sink) = setup_test_environment(get_recording_scorer(seen.clone()), translator);
    drop(backfill_writer);

    live_writer.push_json(&json!({ "chat_id": CHAT, "user_id": 3, "message": "@music_recommender_iss_bot" }), now_ms()).unwrap();
    drop(live_writer);

    runtime.run_until(std::future::pending()).await.unwrap();

    assert!(seen.lock().unwrap().is_empty());
    assert!(sink.published().await.is_empty());
}
