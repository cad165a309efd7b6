use std::time::Duration;

use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::{ClientConfig, ClientContext};
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::KafkaContext;

/// Client settings shared by every producer: all in-sync replicas must
/// acknowledge a write before it is reported as delivered.
pub fn producer_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("client.id", &config.kafka_client_id)
        .set("acks", "all")
        .set("statistics.interval.ms", "10000")
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        );

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    client_config
}

pub fn create_kafka_producer(
    config: &KafkaConfig,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    let client_config = producer_client_config(config);
    debug!("rdkafka producer configuration: {:?}", client_config);

    client_config.create_with_context(KafkaContext)
}

/// Looks up how many partitions `topic` has. Doubles as a connectivity check,
/// so it is called once when a producer is bound to a topic.
pub fn topic_partition_count<C: ClientContext>(
    producer: &FutureProducer<C>,
    topic: &str,
    timeout: Duration,
) -> Result<usize, KafkaError> {
    let metadata = producer.client().fetch_metadata(Some(topic), timeout)?;
    let partitions = metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic)
        .map(|t| t.partitions().len())
        .unwrap_or(0);

    info!(topic, partitions, "fetched topic metadata");
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KafkaConfig {
        KafkaConfig {
            kafka_hosts: "broker-1:9092,broker-2:9092".to_string(),
            kafka_tls: false,
            kafka_client_id: "router-test".to_string(),
            kafka_producer_linger_ms: 5,
            kafka_message_timeout_ms: 1000,
            kafka_compression_codec: "lz4".to_string(),
            kafka_metadata_timeout_ms: 500,
        }
    }

    #[test]
    fn producer_config_requires_acks_from_all_replicas() {
        let client_config = producer_client_config(&config());

        assert_eq!(client_config.get("acks"), Some("all"));
        assert_eq!(client_config.get("client.id"), Some("router-test"));
        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("broker-1:9092,broker-2:9092")
        );
        assert_eq!(client_config.get("compression.codec"), Some("lz4"));
        assert_eq!(client_config.get("security.protocol"), None);
    }

    #[test]
    fn producer_config_enables_tls() {
        let mut config = config();
        config.kafka_tls = true;

        let client_config = producer_client_config(&config);
        assert_eq!(client_config.get("security.protocol"), Some("ssl"));
    }

    #[test]
    fn partition_count_comes_from_broker_metadata() {
        let (cluster, config) = crate::test::create_mock_kafka();
        cluster
            .create_topic("orders_routed", 3, 1)
            .expect("failed to create topic");

        let producer = create_kafka_producer(&config).expect("failed to create producer");
        let partitions =
            topic_partition_count(&producer, "orders_routed", config.metadata_timeout())
                .expect("failed to fetch metadata");

        assert_eq!(partitions, 3);
    }
}
