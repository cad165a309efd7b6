pub mod config;
pub mod kafka_consumer;
pub mod kafka_producer;

use rdkafka::consumer::ConsumerContext;
use rdkafka::error::KafkaError;
use tracing::error;

/// Client context shared by producers and consumers, routes librdkafka's
/// error callbacks into tracing.
pub struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {
    fn error(&self, error: KafkaError, reason: &str) {
        error!(error = %error, "librdkafka error: {}", reason);
    }
}

impl ConsumerContext for KafkaContext {}
