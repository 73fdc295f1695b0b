pub mod google;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::Res;

// Traits.

/// Generic translation client trait that clients must implement.
#[async_trait]
pub trait GenericTranslationClient: Send + Sync + 'static {
    /// Return `text` in English.
    ///
    /// Text that is already English, or whose language cannot be detected, is
    /// returned unchanged. Errors are reserved for failed calls.
    async fn to_english(&self, text: &str) -> Res<String>;
}

// Structs.

/// Translation client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TranslationClient {
    inner: Arc<dyn GenericTranslationClient>,
}

impl Deref for TranslationClient {
    type Target = dyn GenericTranslationClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl TranslationClient {
    pub fn new(inner: Arc<dyn GenericTranslationClient>) -> Self {
        Self { inner }
    }

    /// A translator that hands every text back untouched.
    pub fn passthrough() -> Self {
        Self {
            inner: Arc::new(PassthroughTranslationClient),
        }
    }
}

/// Translation client used when no translation service is configured.
pub struct PassthroughTranslationClient;

#[async_trait]
impl GenericTranslationClient for PassthroughTranslationClient {
    async fn to_english(&self, text: &str) -> Res<String> {
        Ok(text.to_string())
    }
}

// Tests.
