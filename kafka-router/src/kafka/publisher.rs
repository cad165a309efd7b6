use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common_kafka::config::KafkaConfig;
use common_kafka::kafka_producer::{create_kafka_producer, topic_partition_count};
use common_kafka::KafkaContext;
use parking_lot::Mutex;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use thiserror::Error;
use tracing::{info, warn};

use crate::kafka::balancer::LeastBytes;
use crate::record::OutboundRecord;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to create publisher for topic {topic}: {source}")]
    Create {
        topic: String,
        #[source]
        source: KafkaError,
    },
    #[error("failed to publish to topic {topic}: {source}")]
    Send {
        topic: String,
        #[source]
        source: KafkaError,
    },
    #[error("failed to close publisher for topic {topic}: {source}")]
    Close {
        topic: String,
        #[source]
        source: KafkaError,
    },
}

/// A handle bound to one destination topic.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Returns once the write is acknowledged or has failed.
    async fn publish(&self, record: OutboundRecord) -> Result<(), PublishError>;

    /// Flushes pending writes. Called once, at shutdown.
    fn close(&self) -> Result<(), PublishError>;
}

#[async_trait]
pub trait PublisherFactory: Send + Sync + 'static {
    type Publisher: Publisher;

    async fn create(&self, topic: &str) -> Result<Self::Publisher, PublishError>;
}

// Topics without partition metadata are looked up again at most this often
const PARTITION_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub struct KafkaPublisher {
    producer: Arc<FutureProducer<KafkaContext>>,
    topic: String,
    balancer: LeastBytes,
    send_timeout: Duration,
    metadata_timeout: Duration,
    next_refresh: Mutex<Instant>,
}

impl KafkaPublisher {
    /// Sizes the balancer once the topic reports partitions. Until then
    /// librdkafka's partitioner picks the partition.
    async fn refresh_partitions(&self) {
        {
            let mut next_refresh = self.next_refresh.lock();
            let now = Instant::now();
            if now < *next_refresh {
                return;
            }
            *next_refresh = now + PARTITION_REFRESH_INTERVAL;
        }

        let partitions =
            fetch_partition_count(&self.producer, &self.topic, self.metadata_timeout).await;
        if partitions > 0 {
            info!(topic = self.topic.as_str(), partitions, "balancing across partitions");
            self.balancer.resize(partitions);
        }
    }
}

/// Runs the blocking metadata request on the blocking pool. Failures count as
/// zero partitions.
async fn fetch_partition_count(
    producer: &Arc<FutureProducer<KafkaContext>>,
    topic: &str,
    timeout: Duration,
) -> usize {
    let producer = producer.clone();
    let owned_topic = topic.to_string();
    let lookup = tokio::task::spawn_blocking(move || {
        topic_partition_count(&producer, &owned_topic, timeout)
    });

    match lookup.await {
        Ok(Ok(partitions)) => partitions,
        Ok(Err(e)) => {
            warn!(topic, error = %e, "failed to fetch topic metadata");
            0
        }
        Err(e) => {
            warn!(topic, "topic metadata lookup failed: {e:#}");
            0
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, record: OutboundRecord) -> Result<(), PublishError> {
        if self.balancer.is_empty() {
            self.refresh_partitions().await;
        }
        let partition = self.balancer.pick(record.size());

        let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
        for header in &record.headers {
            headers = headers.insert(Header {
                key: header.name.as_str(),
                value: header.value.as_deref(),
            });
        }

        let mut future_record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&self.topic).payload(record.value.as_slice());
        future_record.headers = Some(headers);
        future_record.key = record.key.as_deref();
        future_record.partition = partition;
        future_record.timestamp = record.timestamp;

        self.producer
            .send(future_record, self.send_timeout)
            .await
            .map(|_| ())
            .map_err(|(source, _)| PublishError::Send {
                topic: self.topic.clone(),
                source,
            })
    }

    fn close(&self) -> Result<(), PublishError> {
        self.producer
            .flush(self.send_timeout)
            .map_err(|source| PublishError::Close {
                topic: self.topic.clone(),
                source,
            })
    }
}

/// Builds one producer per destination topic from the shared Kafka settings.
pub struct KafkaPublisherFactory {
    config: KafkaConfig,
    send_timeout: Duration,
}

impl KafkaPublisherFactory {
    pub fn new(config: KafkaConfig, send_timeout: Duration) -> Self {
        Self {
            config,
            send_timeout,
        }
    }
}

#[async_trait]
impl PublisherFactory for KafkaPublisherFactory {
    type Publisher = KafkaPublisher;

    async fn create(&self, topic: &str) -> Result<KafkaPublisher, PublishError> {
        let producer = create_kafka_producer(&self.config)
            .map(Arc::new)
            .map_err(|source| PublishError::Create {
                topic: topic.to_string(),
                source,
            })?;

        let metadata_timeout = self.config.metadata_timeout();
        let partitions = fetch_partition_count(&producer, topic, metadata_timeout).await;
        if partitions == 0 {
            warn!(topic, "no partition metadata yet, using the default partitioner");
        }
        info!(topic, partitions, "created publisher");

        Ok(KafkaPublisher {
            producer,
            topic: topic.to_string(),
            balancer: LeastBytes::new(partitions),
            send_timeout: self.send_timeout,
            metadata_timeout,
            next_refresh: Mutex::new(Instant::now() + PARTITION_REFRESH_INTERVAL),
        })
    }
}
