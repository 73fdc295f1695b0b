//! Stream transport abstraction.
//!
//! The pipeline reads chat records from a partitioned, offset-addressable log
//! and writes aggregate records to an output stream. Both ends are defined as
//! generic traits so the broker can be swapped out (Kafka in production, an
//! in-process channel for tests).

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

use std::{ops::Deref, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::base::types::{Res, Void};

// Types.

/// One raw record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub partition: i32,
    pub offset: i64,
    /// Opaque payload; `None` for tombstones.
    pub payload: Option<Vec<u8>>,
    /// Broker-assigned timestamp in milliseconds since epoch.
    pub timestamp_ms: Option<i64>,
}

// Traits.

/// Generic stream source trait that transports must implement.
#[async_trait]
pub trait GenericStreamSource: Send + Sync + 'static {
    /// Wait up to `timeout` for records and return everything that arrived,
    /// across all partitions.
    ///
    /// An empty batch only means nothing showed up within the wait.
    async fn poll_batch(&self, timeout: Duration) -> Res<Vec<SourceRecord>>;

    /// Wait for the next record, however long it takes.
    ///
    /// Returns `None` once the source can never yield another record.
    async fn next_record(&self) -> Res<Option<SourceRecord>>;

    /// Release the underlying connection. Calling this more than once is allowed.
    async fn close(&self) -> Void;
}

/// Generic stream sink trait that transports must implement.
#[async_trait]
pub trait GenericStreamSink: Send + Sync + 'static {
    /// Publish one payload and wait for the transport's delivery acknowledgment.
    async fn publish(&self, payload: &[u8]) -> Void;

    /// Flush pending deliveries and release the connection. Calling this more than once is allowed.
    async fn close(&self) -> Void;
}

// Structs.

/// Stream source for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StreamSource {
    inner: Arc<dyn GenericStreamSource>,
}

impl Deref for StreamSource {
    type Target = dyn GenericStreamSource;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StreamSource {
    pub fn new(inner: Arc<dyn GenericStreamSource>) -> Self {
        Self { inner }
    }
}

/// Stream sink for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StreamSink {
    inner: Arc<dyn GenericStreamSink>,
}

impl Deref for StreamSink {
    type Target = dyn GenericStreamSink;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StreamSink {
    pub fn new(inner: Arc<dyn GenericStreamSink>) -> Self {
        Self { inner }
    }
}
