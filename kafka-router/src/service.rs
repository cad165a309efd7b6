use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{load_routes, Config};
use crate::kafka::{KafkaPublisherFactory, KafkaRecordSource, PublisherPool, SourceError};
use crate::metrics_consts::ACTIVE_UNITS;
use crate::routing::{MatchStrategy, ReferenceIngestor, Route, RouteDispatcher};
use crate::store::MatchStore;

type Unit = (String, JoinHandle<Result<(), SourceError>>);

/// Owns the shared match store and publisher pool and runs one unit per
/// route, plus a reference ingestor for each correlation route that has
/// reference topics.
pub struct RouterService {
    config: Config,
    routes: Vec<Arc<Route>>,
    store: Arc<MatchStore>,
    publishers: Arc<PublisherPool<KafkaPublisherFactory>>,
    shutdown: CancellationToken,
}

impl RouterService {
    pub fn new(config: Config, routes: Vec<Route>) -> Self {
        let factory = KafkaPublisherFactory::new(config.kafka.clone(), config.publish_timeout());

        Self {
            config,
            routes: routes.into_iter().map(Arc::new).collect(),
            store: Arc::new(MatchStore::new()),
            publishers: Arc::new(PublisherPool::new(factory)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Loads and validates the routes file named by the config.
    pub fn from_config(config: Config) -> Result<Self> {
        let routes = load_routes(&config.routes_path)
            .with_context(|| format!("Failed to load routes from '{}'", config.routes_path))?;
        Ok(Self::new(config, routes))
    }

    /// Creates every consumer up front so a broken route aborts startup
    /// before any record is processed.
    fn spawn_units(&self) -> Result<Vec<Unit>> {
        let mut pending = Vec::new();

        for route in &self.routes {
            let source_config = self.config.source_consumer_config(route);
            let source = KafkaRecordSource::new(&self.config.kafka, &source_config)
                .with_context(|| {
                    format!(
                        "Failed to create consumer for route '{}' (group '{}')",
                        route.display_name(),
                        source_config.group_id
                    )
                })?;

            let dispatcher = RouteDispatcher::new(
                route.clone(),
                source,
                self.store.clone(),
                self.publishers.clone(),
                self.shutdown.child_token(),
            );
            pending.push((route.display_name().to_string(), UnitKind::Dispatcher(dispatcher)));

            match route.reference_correlation() {
                Some(correlation) => {
                    let reference_config = self.config.reference_consumer_config(route);
                    let source = KafkaRecordSource::new(&self.config.kafka, &reference_config)
                        .with_context(|| {
                            format!(
                                "Failed to create reference consumer for route '{}' (group '{}')",
                                route.display_name(),
                                reference_config.group_id
                            )
                        })?;

                    let ingestor = ReferenceIngestor::new(
                        route.clone(),
                        correlation.clone(),
                        source,
                        self.store.clone(),
                        self.shutdown.child_token(),
                    );
                    pending.push((
                        format!("{} (reference)", route.display_name()),
                        UnitKind::Ingestor(ingestor),
                    ));
                }
                None if matches!(route.strategy(), MatchStrategy::Correlation(_)) => warn!(
                    route = route.display_name(),
                    "correlation route has no reference topics and will not forward anything"
                ),
                None => {}
            }
        }

        Ok(pending
            .into_iter()
            .map(|(name, unit)| {
                let handle = match unit {
                    UnitKind::Dispatcher(dispatcher) => spawn_unit(dispatcher.run()),
                    UnitKind::Ingestor(ingestor) => spawn_unit(ingestor.run()),
                };
                (name, handle)
            })
            .collect())
    }

    /// Runs every unit until `shutdown_signal` resolves or every unit has
    /// stopped on its own, then closes the publisher pool.
    pub async fn run_with_shutdown(self, shutdown_signal: impl Future<Output = ()>) -> Result<()> {
        let units = self.spawn_units()?;
        info!(units = units.len(), routes = self.routes.len(), "kafka router started");

        let (names, handles): (Vec<String>, Vec<_>) = units.into_iter().unzip();
        let all_units = join_all(handles);
        tokio::pin!(all_units);

        let results = tokio::select! {
            _ = shutdown_signal => {
                info!("Received shutdown signal, stopping routes...");
                self.shutdown.cancel();
                match tokio::time::timeout(self.config.shutdown_timeout(), &mut all_units).await {
                    Ok(results) => Some(results),
                    Err(_) => {
                        error!(
                            "Route shutdown timed out after {:?}",
                            self.config.shutdown_timeout()
                        );
                        None
                    }
                }
            }
            results = &mut all_units => {
                warn!("every route unit has stopped");
                Some(results)
            }
        };

        for (name, result) in names.iter().zip(results.into_iter().flatten()) {
            match result {
                Ok(Ok(())) => info!(unit = name.as_str(), "unit stopped"),
                Ok(Err(SourceError::Eof)) => {
                    info!(unit = name.as_str(), "source exhausted, unit stopped")
                }
                Ok(Err(e)) => error!(unit = name.as_str(), error = %e, "unit stopped with error"),
                Err(e) => error!(unit = name.as_str(), "unit panicked: {e:#}"),
            }
        }

        let publishers = self.publishers.clone();
        tokio::task::spawn_blocking(move || publishers.close())
            .await
            .context("Publisher shutdown task failed")?
            .context("Failed to close publishers")?;

        info!("kafka router stopped");
        Ok(())
    }
}

enum UnitKind {
    Dispatcher(RouteDispatcher<KafkaRecordSource, KafkaPublisherFactory>),
    Ingestor(ReferenceIngestor<KafkaRecordSource>),
}

fn spawn_unit<Fut>(unit: Fut) -> JoinHandle<Result<(), SourceError>>
where
    Fut: Future<Output = Result<(), SourceError>> + Send + 'static,
{
    metrics::gauge!(ACTIVE_UNITS).increment(1.0);
    tokio::spawn(async move {
        let result = unit.await;
        metrics::gauge!(ACTIVE_UNITS).decrement(1.0);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use envconfig::Envconfig;
    use std::collections::HashMap;

    fn config(routes_path: &str) -> Config {
        let env = HashMap::from([
            ("KAFKA_HOSTS".to_string(), "localhost:1".to_string()),
            ("ROUTES_PATH".to_string(), routes_path.to_string()),
            ("SHUTDOWN_TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);
        Config::init_from_hashmap(&env).unwrap()
    }

    #[test]
    fn test_from_config_reports_routes_path() {
        let err = RouterService::from_config(config("/nonexistent/routes.json"))
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/routes.json"));
    }
}
