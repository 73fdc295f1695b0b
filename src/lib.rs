//! Library root for `trigger-pipeline`.
//!
//! Trigger-pipeline watches a chat message stream and, when a user mentions the bot:
//! - Takes the user's most recent messages from today
//! - Translates them to English where needed
//! - Scores each one with an external prediction service
//! - Publishes the summed scores to an output stream
//!
//! At startup the retained log is replayed to rebuild each user's history, then
//! the live stream is tailed. Every collaborator (stream transport, scoring,
//! translation) sits behind a trait so implementations can be swapped for tests.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

#[cfg(feature = "kafka")]
use base::{config::Config, types::Void};
#[cfg(feature = "kafka")]
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the trigger-pipeline runtime:
/// - Connects the Kafka consumers and producer
/// - Creates the scoring and translation clients
/// - Backfills history, then processes the live stream until shutdown
#[cfg(feature = "kafka")]
pub async fn start(config: Config) -> Void {
    info!("Starting trigger-pipeline ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
