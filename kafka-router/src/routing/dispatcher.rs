use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::kafka::{Publisher, PublisherFactory, PublisherPool, RecordSource, SourceError};
use crate::metrics_consts::{
    MATCH_STORE_FINGERPRINTS, PUBLISH_FAILURES, RECORDS_FORWARDED, RECORDS_RECEIVED,
    RECORDS_SKIPPED, REFERENCE_RECORDS,
};
use crate::record::Record;
use crate::routing::route::Route;
use crate::routing::strategy::{Correlation, Decision};
use crate::store::MatchStore;

enum Flow {
    Continue,
    Stop,
}

/// Pulls a route's source records, evaluates them against the route's
/// strategy and forwards matches to the destination topic.
///
/// Records are handled one at a time, in delivery order. The unit stops when
/// `shutdown` fires or the source fails; a record in flight at that point is
/// abandoned. Delivery is at most once: failed publishes are logged and
/// dropped.
pub struct RouteDispatcher<S, F: PublisherFactory> {
    source: S,
    forwarder: Forwarder<F>,
}

struct Forwarder<F: PublisherFactory> {
    route: Arc<Route>,
    store: Arc<MatchStore>,
    publishers: Arc<PublisherPool<F>>,
    shutdown: CancellationToken,
    labels: [(&'static str, String); 1],
}

impl<S: RecordSource, F: PublisherFactory> RouteDispatcher<S, F> {
    pub fn new(
        route: Arc<Route>,
        source: S,
        store: Arc<MatchStore>,
        publishers: Arc<PublisherPool<F>>,
        shutdown: CancellationToken,
    ) -> Self {
        let labels = [("route", route.display_name().to_string())];
        Self {
            source,
            forwarder: Forwarder {
                route,
                store,
                publishers,
                shutdown,
                labels,
            },
        }
    }

    /// Runs until cancelled (Ok) or until the source fails (Err).
    pub async fn run(mut self) -> Result<(), SourceError> {
        let route = self.forwarder.route.clone();
        info!(
            route = route.display_name(),
            strategy = route.strategy().name(),
            "route listening to {} -> {}",
            route.source_topics().join(","),
            route.destination_topic()
        );

        loop {
            let record = tokio::select! {
                biased;
                _ = self.forwarder.shutdown.cancelled() => break,
                read = self.source.read_next() => read?,
            };

            metrics::counter!(RECORDS_RECEIVED, &self.forwarder.labels).increment(1);
            if let Flow::Stop = self.forwarder.handle(record).await {
                break;
            }
        }

        info!(route = route.display_name(), "route stopped");
        Ok(())
    }
}

impl<F: PublisherFactory> Forwarder<F> {
    async fn handle(&self, record: Record) -> Flow {
        let route = self.route.display_name();

        let decision = match self
            .route
            .strategy()
            .evaluate(route, &self.store, record.payload())
        {
            Ok(decision) => decision,
            Err(e) => {
                warn!(route, offset = record.offset, error = %e, "skipping invalid record");
                self.skipped(e.kind());
                return Flow::Continue;
            }
        };

        let Decision::Forward { matched } = decision else {
            self.skipped("no_match");
            return Flow::Continue;
        };

        let destination = self.route.destination_topic();
        let publisher = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Flow::Stop,
            publisher = self.publishers.get(destination) => publisher,
        };
        let publisher = match publisher {
            Ok(publisher) => publisher,
            Err(e) => {
                error!(
                    route,
                    offset = record.offset,
                    error = %e,
                    "publisher unavailable, dropping record"
                );
                metrics::counter!(PUBLISH_FAILURES, &self.labels).increment(1);
                return Flow::Continue;
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Flow::Stop,
            result = publisher.publish(record.to_outbound()) => result,
        };

        match result {
            Ok(()) => {
                info!(
                    route,
                    offset = record.offset,
                    matched = matched.as_deref().unwrap_or(""),
                    "forwarded record to {}",
                    destination
                );
                metrics::counter!(RECORDS_FORWARDED, &self.labels).increment(1);
            }
            Err(e) => {
                error!(route, offset = record.offset, error = %e, "write failed, dropping record");
                metrics::counter!(PUBLISH_FAILURES, &self.labels).increment(1);
            }
        }
        Flow::Continue
    }

    fn skipped(&self, reason: &'static str) {
        let labels = [
            ("route", self.labels[0].1.clone()),
            ("reason", reason.to_string()),
        ];
        metrics::counter!(RECORDS_SKIPPED, &labels).increment(1);
    }
}

/// Learns fingerprints from a route's reference topics.
pub struct ReferenceIngestor<S> {
    route: Arc<Route>,
    correlation: Correlation,
    source: S,
    store: Arc<MatchStore>,
    shutdown: CancellationToken,
}

impl<S: RecordSource> ReferenceIngestor<S> {
    pub fn new(
        route: Arc<Route>,
        correlation: Correlation,
        source: S,
        store: Arc<MatchStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            route,
            correlation,
            source,
            store,
            shutdown,
        }
    }

    /// Runs until cancelled (Ok) or until the source fails (Err).
    pub async fn run(mut self) -> Result<(), SourceError> {
        let route_ref = self.route.clone();
        let route = route_ref.display_name();
        info!(
            route,
            "route learning references from {}",
            self.route.reference_topics().join(",")
        );

        loop {
            let record = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                read = self.source.read_next() => read?,
            };

            let outcome = match self
                .correlation
                .ingest(route, &self.store, record.payload())
            {
                Ok(true) => {
                    let size = self.store.size(route);
                    debug!(route, offset = record.offset, size, "stored reference fingerprint");
                    metrics::gauge!(MATCH_STORE_FINGERPRINTS, "route" => route.to_string())
                        .set(size as f64);
                    "added"
                }
                Ok(false) => "duplicate",
                Err(e) => {
                    warn!(
                        route,
                        offset = record.offset,
                        error = %e,
                        "skipping invalid reference record"
                    );
                    "invalid"
                }
            };
            metrics::counter!(REFERENCE_RECORDS, "route" => route.to_string(), "outcome" => outcome)
                .increment(1);
        }

        info!(route, "reference ingestion stopped");
        Ok(())
    }
}
