use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::ClientConfig;
use tracing::debug;

use crate::config::{ConsumerConfig, KafkaConfig};
use crate::KafkaContext;

pub fn consumer_client_config(common: &KafkaConfig, consumer: &ConsumerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &common.kafka_hosts)
        .set("client.id", &common.kafka_client_id)
        .set("group.id", &consumer.group_id)
        .set("statistics.interval.ms", "10000")
        .set("auto.offset.reset", &consumer.offset_reset)
        .set("enable.auto.commit", "true")
        .set(
            "auto.commit.interval.ms",
            consumer.commit_interval.as_millis().to_string(),
        );

    if common.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    client_config
}

/// Creates a consumer that joins `consumer.group_id` and subscribes to every
/// topic in `consumer.topics`.
pub fn create_kafka_consumer(
    common: &KafkaConfig,
    consumer: &ConsumerConfig,
) -> Result<StreamConsumer<KafkaContext>, KafkaError> {
    let client_config = consumer_client_config(common, consumer);
    debug!("rdkafka consumer configuration: {:?}", client_config);

    let stream: StreamConsumer<KafkaContext> = client_config.create_with_context(KafkaContext)?;
    let topics: Vec<&str> = consumer.topics.iter().map(String::as_str).collect();
    stream.subscribe(&topics)?;

    Ok(stream)
}
