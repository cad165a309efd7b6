use async_trait::async_trait;
use common_kafka::config::{ConsumerConfig, KafkaConfig};
use common_kafka::kafka_consumer::create_kafka_consumer;
use common_kafka::KafkaContext;
use rdkafka::consumer::StreamConsumer;
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::record::Record;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source stream ended")]
    Eof,
    #[error("failed to read from source stream: {0}")]
    Transport(#[from] KafkaError),
}

/// A stream of records. Reads may suspend indefinitely; callers cancel a read
/// by dropping its future.
#[async_trait]
pub trait RecordSource: Send {
    async fn read_next(&mut self) -> Result<Record, SourceError>;
}

pub struct KafkaRecordSource {
    consumer: StreamConsumer<KafkaContext>,
}

impl KafkaRecordSource {
    pub fn new(common: &KafkaConfig, consumer: &ConsumerConfig) -> Result<Self, KafkaError> {
        Ok(Self {
            consumer: create_kafka_consumer(common, consumer)?,
        })
    }
}

#[async_trait]
impl RecordSource for KafkaRecordSource {
    async fn read_next(&mut self) -> Result<Record, SourceError> {
        let message = self.consumer.recv().await?;
        Ok(Record::from(&message))
    }
}
