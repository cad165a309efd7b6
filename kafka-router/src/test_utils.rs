//! In-memory sources and publishers for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use tokio::sync::mpsc;

use crate::kafka::{PublishError, Publisher, PublisherFactory, RecordSource, SourceError};
use crate::record::{OutboundRecord, Record};

pub fn record(topic: &str, offset: i64, payload: &str) -> Record {
    Record {
        topic: topic.to_string(),
        partition: 0,
        offset,
        key: Some(format!("key-{offset}").into_bytes()),
        value: payload.as_bytes().to_vec(),
        headers: Vec::new(),
        timestamp: Some(1_700_000_000_000 + offset),
    }
}

/// Source fed through a channel. Reports `Eof` once every sender is dropped.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Result<Record, SourceError>>,
}

pub fn channel_source() -> (
    mpsc::UnboundedSender<Result<Record, SourceError>>,
    ChannelSource,
) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (sender, ChannelSource { receiver })
}

#[async_trait]
impl RecordSource for ChannelSource {
    async fn read_next(&mut self) -> Result<Record, SourceError> {
        match self.receiver.recv().await {
            Some(result) => result,
            None => Err(SourceError::Eof),
        }
    }
}

pub fn transport_error() -> SourceError {
    SourceError::Transport(KafkaError::MessageConsumption(
        RDKafkaErrorCode::BrokerTransportFailure,
    ))
}

#[derive(Default)]
struct Behaviour {
    fail_create: HashSet<String>,
    stall_create: HashSet<String>,
    fail_publish: HashSet<String>,
    fail_close: HashSet<String>,
    stall_publish: HashSet<String>,
}

/// Keeps everything it is asked to publish.
pub struct RecordingPublisher {
    topic: String,
    published: Mutex<Vec<OutboundRecord>>,
    close_calls: AtomicUsize,
    fail_publish: bool,
    fail_close: bool,
    stall_publish: bool,
}

impl RecordingPublisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn published(&self) -> Vec<OutboundRecord> {
        self.published.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, record: OutboundRecord) -> Result<(), PublishError> {
        if self.stall_publish {
            std::future::pending::<()>().await;
        }
        if self.fail_publish {
            return Err(PublishError::Send {
                topic: self.topic.clone(),
                source: KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
            });
        }
        self.published.lock().push(record);
        Ok(())
    }

    fn close(&self) -> Result<(), PublishError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(PublishError::Close {
                topic: self.topic.clone(),
                source: KafkaError::Flush(RDKafkaErrorCode::OperationTimedOut),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisherFactory {
    pub created: Arc<AtomicUsize>,
    behaviour: Behaviour,
}

impl RecordingPublisherFactory {
    pub fn failing_create(mut self, topic: &str) -> Self {
        self.behaviour.fail_create.insert(topic.to_string());
        self
    }

    /// Creating a publisher for `topic` never completes.
    pub fn stalling_create(mut self, topic: &str) -> Self {
        self.behaviour.stall_create.insert(topic.to_string());
        self
    }

    pub fn failing_publish(mut self, topic: &str) -> Self {
        self.behaviour.fail_publish.insert(topic.to_string());
        self
    }

    pub fn failing_close(mut self, topic: &str) -> Self {
        self.behaviour.fail_close.insert(topic.to_string());
        self
    }

    /// Publishes to `topic` never complete.
    pub fn stalling_publish(mut self, topic: &str) -> Self {
        self.behaviour.stall_publish.insert(topic.to_string());
        self
    }
}

#[async_trait]
impl PublisherFactory for RecordingPublisherFactory {
    type Publisher = RecordingPublisher;

    async fn create(&self, topic: &str) -> Result<RecordingPublisher, PublishError> {
        if self.behaviour.stall_create.contains(topic) {
            std::future::pending::<()>().await;
        }
        if self.behaviour.fail_create.contains(topic) {
            return Err(PublishError::Create {
                topic: topic.to_string(),
                source: KafkaError::ClientCreation("broker unreachable".to_string()),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingPublisher {
            topic: topic.to_string(),
            published: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            fail_publish: self.behaviour.fail_publish.contains(topic),
            fail_close: self.behaviour.fail_close.contains(topic),
            stall_publish: self.behaviour.stall_publish.contains(topic),
        })
    }
}
