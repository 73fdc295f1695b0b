//! Stream processing for the trigger pipeline.
//!
//! This module provides the ingestion phases and the logic they share:
//! - Parsing records and deciding what enters a user's history
//! - The per-user rolling history window
//! - Backfilling history at startup and tailing the live stream
//! - Fanning a user's window out to scoring when the bot is mentioned

pub mod admission;
pub mod backfill;
pub mod history;
pub mod live;
pub mod mention;
pub mod trigger;
