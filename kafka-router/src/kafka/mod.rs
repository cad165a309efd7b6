pub mod balancer;
pub mod publisher;
pub mod publisher_pool;
pub mod source;

pub use publisher::{
    KafkaPublisher, KafkaPublisherFactory, PublishError, Publisher, PublisherFactory,
};
pub use publisher_pool::PublisherPool;
pub use source::{KafkaRecordSource, RecordSource, SourceError};
