//! Core components, types, and utilities for the trigger pipeline.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Common types, error variants, and result handling.

pub mod config;
pub mod types;
