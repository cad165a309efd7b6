use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::kafka::publisher::{PublishError, Publisher, PublisherFactory};

type Slot<P> = Arc<OnceCell<Arc<P>>>;

struct Registered<P> {
    slots: HashMap<String, Slot<P>>,
    // Topics whose publisher was built, in build order; close() walks it
    order: Vec<String>,
}

/// Lazily creates one publisher per destination topic and hands out the same
/// handle to every caller afterwards.
pub struct PublisherPool<F: PublisherFactory> {
    factory: F,
    publishers: Mutex<Registered<F::Publisher>>,
}

impl<F: PublisherFactory> PublisherPool<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            publishers: Mutex::new(Registered {
                slots: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Returns the publisher bound to `topic`, creating it on first use.
    ///
    /// Concurrent first use of one topic waits on a single creation. Creating
    /// a publisher for one topic never holds up callers of another topic.
    /// A failed creation is not remembered; the next call tries again.
    pub async fn get(&self, topic: &str) -> Result<Arc<F::Publisher>, PublishError> {
        let slot = self
            .publishers
            .lock()
            .slots
            .entry(topic.to_string())
            .or_default()
            .clone();

        let publisher = slot
            .get_or_try_init(|| async {
                let publisher = Arc::new(self.factory.create(topic).await?);
                self.publishers.lock().order.push(topic.to_string());
                Ok::<_, PublishError>(publisher)
            })
            .await?;
        Ok(publisher.clone())
    }

    pub fn len(&self) -> usize {
        self.publishers.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every registered publisher in registration order and empties
    /// the pool. Every close is attempted; the first failure is returned.
    pub fn close(&self) -> Result<(), PublishError> {
        let drained: Vec<(String, Arc<F::Publisher>)> = {
            let mut publishers = self.publishers.lock();
            let order = std::mem::take(&mut publishers.order);
            let mut slots = std::mem::take(&mut publishers.slots);
            order
                .into_iter()
                .filter_map(|topic| {
                    let publisher = slots.remove(&topic)?.get()?.clone();
                    Some((topic, publisher))
                })
                .collect()
        };

        let mut first_error = None;
        for (topic, publisher) in drained {
            match publisher.close() {
                Ok(()) => info!(topic, "closed publisher"),
                Err(e) => {
                    error!(topic, error = %e, "failed to close publisher");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{RecordingPublisher, RecordingPublisherFactory};

    #[tokio::test]
    async fn test_get_reuses_handle() {
        let factory = RecordingPublisherFactory::default();
        let created = factory.created.clone();
        let pool = PublisherPool::new(factory);

        let first = pool.get("orders_routed").await.unwrap();
        let second = pool.get("orders_routed").await.unwrap();
        let other = pool.get("payments_routed").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_one_handle() {
        let factory = RecordingPublisherFactory::default();
        let created = factory.created.clone();
        let pool = Arc::new(PublisherPool::new(factory));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let topic = if i % 2 == 0 { "even" } else { "odd" };
                    pool.get(topic).await.unwrap()
                })
            })
            .collect();
        let mut publishers: Vec<Arc<RecordingPublisher>> = Vec::new();
        for handle in handles {
            publishers.push(handle.await.unwrap());
        }

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&publishers[0], &publishers[2]));
        assert!(Arc::ptr_eq(&publishers[1], &publishers[3]));
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_is_not_registered() {
        let factory = RecordingPublisherFactory::default().failing_create("broken");
        let pool = PublisherPool::new(factory);

        assert!(matches!(
            pool.get("broken").await,
            Err(PublishError::Create { .. })
        ));
        assert!(pool.is_empty());
        assert!(pool.get("healthy").await.is_ok());
        assert_eq!(pool.len(), 1);

        // Still failing, still not registered
        assert!(pool.get("broken").await.is_err());
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_creation_does_not_hold_up_other_topics() {
        let factory = RecordingPublisherFactory::default().stalling_create("slow");
        let pool = Arc::new(PublisherPool::new(factory));

        let slow = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get("slow").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_secs(1), pool.get("fast"))
            .await
            .expect("creating another topic was blocked")
            .unwrap();
        assert_eq!(fast.topic(), "fast");
        assert!(!slow.is_finished());
        assert_eq!(pool.len(), 1);

        slow.abort();
    }

    #[tokio::test]
    async fn test_close_attempts_every_handle() {
        let factory = RecordingPublisherFactory::default()
            .failing_close("first")
            .failing_close("third");
        let pool = PublisherPool::new(factory);

        let mut handles = Vec::new();
        for topic in ["first", "second", "third"] {
            handles.push(pool.get(topic).await.unwrap());
        }

        match pool.close() {
            Err(PublishError::Close { topic, .. }) => assert_eq!(topic, "first"),
            other => panic!("expected close error, got {other:?}"),
        }
        for handle in &handles {
            assert_eq!(handle.close_calls(), 1);
        }
        assert!(pool.is_empty());

        // Nothing left to close
        assert!(pool.close().is_ok());
        for handle in &handles {
            assert_eq!(handle.close_calls(), 1);
        }
    }
}
