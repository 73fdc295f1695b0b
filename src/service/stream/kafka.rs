//! Kafka transport via `rdkafka`.
//!
//! Two consumers are used over the lifetime of the process:
//! - a backfill consumer that is assigned every partition of the source topic
//!   directly at its earliest retained offset, with no group membership and no
//!   commits, so its first batch read does not wait on a group rebalance;
//! - a live consumer subscribed in the configured group, starting from the latest offset.
//!
//! Closing a consumer drops it, which leaves the group and shuts its broker connections.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rdkafka::{
    ClientConfig, Message, Offset, TopicPartitionList,
    consumer::{Consumer, StreamConsumer},
    message::BorrowedMessage,
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use tokio::{sync::RwLock, time::timeout};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{GenericStreamSink, GenericStreamSource, SourceRecord, StreamSink, StreamSource};

/// Largest batch returned by a single [`GenericStreamSource::poll_batch`] call.
const MAX_BATCH: usize = 500;
/// How long a batch keeps collecting once its first record arrived.
const BATCH_LINGER: Duration = Duration::from_millis(10);
/// How long shutdown waits for in-flight deliveries.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);
/// How long startup waits for the source topic's partition list.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

// Extra methods on `StreamSource` and `StreamSink` applied by the kafka implementation.

impl StreamSource {
    /// Creates the backfill consumer, assigned every partition at the earliest retained offset.
    pub fn kafka_backfill(config: &Config) -> Res<Self> {
        let source = KafkaStreamSource::assigned_from_beginning(config)?;
        Ok(Self { inner: Arc::new(source) })
    }

    /// Creates the live consumer, positioned at the latest offset of the configured group.
    pub fn kafka_live(config: &Config) -> Res<Self> {
        let source = KafkaStreamSource::subscribed(config, &config.group_id, "latest")?;
        Ok(Self { inner: Arc::new(source) })
    }
}

impl StreamSink {
    /// Creates the producer for the result topic.
    pub fn kafka(config: &Config) -> Res<Self> {
        let sink = KafkaStreamSink::new(config)?;
        Ok(Self { inner: Arc::new(sink) })
    }
}

/// Connection settings shared by consumers and the producer.
fn client_config(config: &Config) -> ClientConfig {
    let mut client = ClientConfig::new();

    client.set("bootstrap.servers", &config.brokers).set("security.protocol", &config.security_protocol);

    if let (Some(username), Some(password)) = (&config.sasl_username, &config.sasl_password) {
        client
            .set("sasl.mechanism", &config.sasl_mechanism)
            .set("sasl.username", username)
            .set("sasl.password", password);
    }

    client
}

/// Every listed partition of `topic`, positioned at its earliest retained offset.
fn from_beginning(topic: &str, partitions: &[i32]) -> Res<TopicPartitionList> {
    if partitions.is_empty() {
        return Err(anyhow::anyhow!("Topic `{}` has no partitions to backfill from.", topic));
    }

    let mut assignment = TopicPartitionList::new();
    for partition in partitions {
        assignment.add_partition_offset(topic, *partition, Offset::Beginning)?;
    }

    Ok(assignment)
}

fn to_record(message: &BorrowedMessage<'_>) -> SourceRecord {
    SourceRecord {
        partition: message.partition(),
        offset: message.offset(),
        payload: message.payload().map(<[u8]>::to_vec),
        timestamp_ms: message.timestamp().to_millis(),
    }
}

// Structs.

/// Kafka consumer reading the source topic; `None` once closed.
pub struct KafkaStreamSource {
    consumer: RwLock<Option<StreamConsumer>>,
}

impl KafkaStreamSource {
    fn from_consumer(consumer: StreamConsumer) -> Self {
        Self {
            consumer: RwLock::new(Some(consumer)),
        }
    }

    /// Group member that commits its position and receives partitions from the broker.
    #[instrument(name = "KafkaStreamSource::subscribed", skip(config))]
    fn subscribed(config: &Config, group_id: &str, offset_reset: &str) -> Res<Self> {
        let consumer: StreamConsumer = client_config(config)
            .set("group.id", group_id)
            .set("auto.offset.reset", offset_reset)
            .set("enable.auto.commit", "true")
            .create()?;

        consumer.subscribe(&[config.source_topic.as_str()])?;

        info!("Subscribed to `{}` as group `{}`.", config.source_topic, group_id);

        Ok(Self::from_consumer(consumer))
    }

    /// Standalone consumer that reads every partition from its earliest retained offset.
    ///
    /// The group id only satisfies the client; `assign` never joins the group.
    #[instrument(name = "KafkaStreamSource::assigned_from_beginning", skip_all)]
    fn assigned_from_beginning(config: &Config) -> Res<Self> {
        let group_id = format!("{}-backfill-{}", config.group_id, uuid::Uuid::new_v4().simple());

        let consumer: StreamConsumer = client_config(config)
            .set("group.id", &group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .create()?;

        let topic = config.source_topic.as_str();
        let metadata = consumer.fetch_metadata(Some(topic), Timeout::After(METADATA_TIMEOUT))?;

        let partitions: Vec<i32> = metadata
            .topics()
            .iter()
            .filter(|t| t.name() == topic)
            .flat_map(|t| t.partitions().iter().map(|p| p.id()))
            .collect();

        consumer.assign(&from_beginning(topic, &partitions)?)?;

        info!("Assigned {} partition(s) of `{}` from the beginning.", partitions.len(), topic);

        Ok(Self::from_consumer(consumer))
    }
}

#[async_trait]
impl GenericStreamSource for KafkaStreamSource {
    async fn poll_batch(&self, wait: Duration) -> Res<Vec<SourceRecord>> {
        let guard = self.consumer.read().await;
        let Some(consumer) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();

        match timeout(wait, consumer.recv()).await {
            Ok(message) => batch.push(to_record(&message?)),
            Err(_) => return Ok(batch),
        }

        while batch.len() < MAX_BATCH {
            match timeout(BATCH_LINGER, consumer.recv()).await {
                Ok(message) => batch.push(to_record(&message?)),
                Err(_) => break,
            }
        }

        Ok(batch)
    }

    async fn next_record(&self) -> Res<Option<SourceRecord>> {
        let guard = self.consumer.read().await;
        let Some(consumer) = guard.as_ref() else {
            return Ok(None);
        };

        let message = consumer.recv().await?;
        Ok(Some(to_record(&message)))
    }

    async fn close(&self) -> Void {
        if let Some(consumer) = self.consumer.write().await.take() {
            drop(consumer);
            info!("Consumer closed.");
        }

        Ok(())
    }
}

/// Kafka producer for the result topic.
pub struct KafkaStreamSink {
    producer: FutureProducer,
    topic: String,
    ack_timeout: Duration,
}

impl KafkaStreamSink {
    #[instrument(name = "KafkaStreamSink::new", skip_all)]
    fn new(config: &Config) -> Res<Self> {
        let client_id = format!("producer-{}", uuid::Uuid::new_v4().simple());

        let producer: FutureProducer = client_config(config)
            .set("client.id", &client_id)
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .create()?;

        info!("Producer `{}` ready for `{}`.", client_id, config.result_topic);

        Ok(Self {
            producer,
            topic: config.result_topic.clone(),
            ack_timeout: config.publish_timeout(),
        })
    }
}

#[async_trait]
impl GenericStreamSink for KafkaStreamSink {
    async fn publish(&self, payload: &[u8]) -> Void {
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload);

        self.producer
            .send(record, Timeout::After(self.ack_timeout))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Delivery to `{}` failed: {}", self.topic, e))?;

        Ok(())
    }

    async fn close(&self) -> Void {
        self.producer.flush(Timeout::After(FLUSH_TIMEOUT))?;
        Ok(())
    }
}

// Tests.
