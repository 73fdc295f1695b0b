//! In-process stream transport.
//!
//! A single-partition log backed by a tokio channel. Records pushed through a
//! [`MemoryStreamWriter`] are read back by a [`MemoryStreamSource`]; dropping
//! every writer ends the stream. [`MemoryStreamSink`] keeps every published
//! payload so it can be inspected afterwards.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::base::types::{Res, Void};

use super::{GenericStreamSink, GenericStreamSource, SourceRecord, StreamSink, StreamSource};

/// Largest batch returned by a single [`GenericStreamSource::poll_batch`] call.
const MAX_BATCH: usize = 500;

// Extra methods on `StreamSource` and `StreamSink` applied by the memory implementation.

impl StreamSource {
    /// Creates an in-memory source and the writer that feeds it.
    pub fn memory() -> (MemoryStreamWriter, Self) {
        let (writer, source) = channel();
        (writer, Self { inner: Arc::new(source) })
    }
}

impl StreamSink {
    /// Wraps an in-memory sink, keeping the caller's handle for inspection.
    pub fn memory(sink: Arc<MemoryStreamSink>) -> Self {
        Self { inner: sink }
    }
}

/// Creates a connected writer/source pair.
pub fn channel() -> (MemoryStreamWriter, MemoryStreamSource) {
    let (sender, receiver) = mpsc::unbounded_channel();

    let writer = MemoryStreamWriter {
        sender,
        next_offset: Arc::new(AtomicI64::new(0)),
    };
    let source = MemoryStreamSource {
        receiver: Mutex::new(receiver),
    };

    (writer, source)
}

// Structs.

/// Producer half of the in-memory log.
#[derive(Clone)]
pub struct MemoryStreamWriter {
    sender: mpsc::UnboundedSender<SourceRecord>,
    next_offset: Arc<AtomicI64>,
}

impl MemoryStreamWriter {
    /// Appends a raw payload with the given broker timestamp.
    pub fn push(&self, payload: impl Into<Vec<u8>>, timestamp_ms: Option<i64>) -> Void {
        let record = SourceRecord {
            partition: 0,
            offset: self.next_offset.fetch_add(1, Ordering::SeqCst),
            payload: Some(payload.into()),
            timestamp_ms,
        };

        self.sender.send(record).map_err(|_| anyhow::anyhow!("Memory stream is closed."))
    }

    /// Appends a JSON payload with the given broker timestamp.
    pub fn push_json(&self, payload: &Value, timestamp_ms: Option<i64>) -> Void {
        self.push(serde_json::to_vec(payload)?, timestamp_ms)
    }
}

/// Consumer half of the in-memory log.
pub struct MemoryStreamSource {
    receiver: Mutex<mpsc::UnboundedReceiver<SourceRecord>>,
}

#[async_trait]
impl GenericStreamSource for MemoryStreamSource {
    async fn poll_batch(&self, timeout: Duration) -> Res<Vec<SourceRecord>> {
        let mut receiver = self.receiver.lock().await;
        let mut batch = Vec::new();

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(record)) => batch.push(record),
            Ok(None) | Err(_) => return Ok(batch),
        }

        while batch.len() < MAX_BATCH {
            match receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }

        Ok(batch)
    }

    async fn next_record(&self) -> Res<Option<SourceRecord>> {
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn close(&self) -> Void {
        self.receiver.lock().await.close();
        Ok(())
    }
}

/// Sink that acknowledges every publish immediately and records the payload.
#[derive(Default)]
pub struct MemoryStreamSink {
    published: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStreamSink {
    /// Every payload published so far, oldest first.
    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.published.lock().await.clone()
    }

    /// Every payload published so far, decoded as JSON.
    pub async fn published_json(&self) -> Res<Vec<Value>> {
        let published = self.published.lock().await;
        let mut values = Vec::with_capacity(published.len());

        for payload in published.iter() {
            values.push(serde_json::from_slice(payload)?);
        }

        Ok(values)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenericStreamSink for MemoryStreamSink {
    async fn publish(&self, payload: &[u8]) -> Void {
        if self.is_closed() {
            return Err(anyhow::anyhow!("Memory sink is closed."));
        }

        self.published.lock().await.push(payload.to_vec());
        Ok(())
    }

    async fn close(&self) -> Void {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// Tests.
