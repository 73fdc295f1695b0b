pub mod http;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, ScoreMap};

// Traits.

/// Generic scoring client trait that clients must implement.
///
/// A scoring service takes one English text and returns a map of numeric
/// fields (sentiment, energy, and so on) describing it.
#[async_trait]
pub trait GenericScoringClient: Send + Sync + 'static {
    /// Score a single message.
    async fn score(&self, text: &str) -> Res<ScoreMap>;
}

// Structs.

/// Scoring client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ScoringClient {
    inner: Arc<dyn GenericScoringClient>,
}

impl Deref for ScoringClient {
    type Target = dyn GenericScoringClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ScoringClient {
    pub fn new(inner: Arc<dyn GenericScoringClient>) -> Self {
        Self { inner }
    }
}
