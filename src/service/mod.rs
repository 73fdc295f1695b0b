//! Service integrations for external APIs and transports.
//!
//! This module contains the collaborators used by the trigger pipeline:
//! - Stream transports (e.g., Kafka, in-memory)
//! - Scoring services (e.g., an HTTP predict endpoint)
//! - Translation services (e.g., Google Translate)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod scoring;
pub mod stream;
pub mod translate;

#[cfg(test)]
pub(crate) mod test_server;
