//! `trigger-pipeline` binary: loads settings, installs logging, and runs the
//! Kafka-backed pipeline (backfill today's history, then tail the chat topic)
//! until Ctrl-C or a broker failure.

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};
use trigger_pipeline::base::{config::Config, types::Void};

/// Scores a chat user's recent messages whenever they mention the bot.
///
/// Settings are read from a TOML file and then overridden by `TRIGGER_PIPELINE_*`
/// environment variables (for example `TRIGGER_PIPELINE_BROKERS`,
/// `TRIGGER_PIPELINE_PREDICT_URL`, `TRIGGER_PIPELINE_WATCHED_CHAT_IDS=-1,-2`).
/// Each mention publishes one record of summed scores to the result topic.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Settings file; `.hidden/config.toml` is used when present and this is omitted.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Log verbosity: phases and published aggregates by default, `-v` adds
    /// skipped records and per-message scores, `-vv` adds client internals.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("trigger-pipeline");
    let otel = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    tracing::info!(
        "Reading `{}`, writing `{}`, watching chats {:?}, window of {} message(s).",
        config.source_topic,
        config.result_topic,
        config.watched_chat_ids,
        config.window_capacity
    );

    trigger_pipeline::start(config).await
}

// Tests.
