use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "kafka-router")]
    pub kafka_client_id: String,

    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "20000")]
    // Time before we stop retrying producing a message: 20 seconds
    pub kafka_message_timeout_ms: u32,

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "10000")]
    // Upper bound for one topic metadata lookup
    pub kafka_metadata_timeout_ms: u64,
}

impl KafkaConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_metadata_timeout_ms)
    }
}

#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub topics: Vec<String>,

    // earliest, latest
    pub offset_reset: String,

    // Offsets are committed in the background by librdkafka at this interval
    pub commit_interval: Duration,
}

impl ConsumerConfig {
    pub fn new(group_id: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            group_id: group_id.into(),
            topics,
            offset_reset: "earliest".to_string(),
            commit_interval: Duration::from_secs(1),
        }
    }

    pub fn with_offset_reset(mut self, offset_reset: impl Into<String>) -> Self {
        self.offset_reset = offset_reset.into();
        self
    }

    pub fn with_commit_interval(mut self, commit_interval: Duration) -> Self {
        self.commit_interval = commit_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_builder_overrides_defaults() {
        let config = ConsumerConfig::new("router-orders", vec!["orders".to_string()])
            .with_offset_reset("latest")
            .with_commit_interval(Duration::from_millis(250));

        assert_eq!(config.group_id, "router-orders");
        assert_eq!(config.topics, vec!["orders".to_string()]);
        assert_eq!(config.offset_reset, "latest");
        assert_eq!(config.commit_interval, Duration::from_millis(250));
    }

    #[test]
    fn consumer_config_defaults() {
        let config = ConsumerConfig::new("group", vec![]);
        assert_eq!(config.offset_reset, "earliest");
        assert_eq!(config.commit_interval, Duration::from_secs(1));
    }
}
