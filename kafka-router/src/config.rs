use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common_kafka::config::{ConsumerConfig, KafkaConfig};
use envconfig::Envconfig;
use serde::Deserialize;
use thiserror::Error;

use crate::fingerprint::{FieldPath, FingerprintError};
use crate::routing::{AllowList, Correlation, MatchStrategy, Route};

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    // Each route unit joins "<group>-<route slug>"
    #[envconfig(default = "kafka-router")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String,

    #[envconfig(default = "1000")]
    pub kafka_commit_interval_ms: u64,

    #[envconfig(default = "config/routes.json")]
    pub routes_path: String,

    #[envconfig(default = "5000")]
    pub publish_timeout_ms: u64,

    #[envconfig(default = "30")]
    pub shutdown_timeout_secs: u64,

    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.kafka_commit_interval_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn source_consumer_config(&self, route: &Route) -> ConsumerConfig {
        self.consumer_config(
            format!("{}-{}", self.kafka_consumer_group, route.slug()),
            route.source_topics().to_vec(),
        )
    }

    pub fn reference_consumer_config(&self, route: &Route) -> ConsumerConfig {
        self.consumer_config(
            format!("{}-{}-reference", self.kafka_consumer_group, route.slug()),
            route.reference_topics().to_vec(),
        )
    }

    fn consumer_config(&self, group_id: String, topics: Vec<String>) -> ConsumerConfig {
        ConsumerConfig::new(group_id, topics)
            .with_offset_reset(self.kafka_consumer_offset_reset.clone())
            .with_commit_interval(self.commit_interval())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read routes file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse routes: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no routes configured")]
    NoRoutes,
    #[error("route {route}: at least one source topic is required")]
    NoSourceTopics { route: String },
    #[error("route {route}: topic names must not be empty")]
    EmptyTopic { route: String },
    #[error("route {route}: invalid field path: {source}")]
    InvalidFieldPath {
        route: String,
        #[source]
        source: FingerprintError,
    },
    #[error("route {route}: fingerprint_fields and match_values cannot be combined")]
    ConflictingStrategies { route: String },
    #[error("route {route}: reference_topics require fingerprint_fields")]
    ReferenceWithoutFingerprint { route: String },
    #[error("route {route} is defined more than once")]
    DuplicateRoute { route: String },
}

fn default_match_field() -> String {
    "data.isn".to_string()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub source_topics: Vec<String>,
    pub destination_topic: String,
    #[serde(default)]
    pub reference_topics: Vec<String>,
    #[serde(default)]
    pub fingerprint_fields: Vec<String>,
    #[serde(default = "default_match_field")]
    pub match_field: String,
    #[serde(default)]
    pub match_values: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RoutesFile {
    pub routes: Vec<RouteConfig>,
}

impl RouteConfig {
    pub fn into_route(self) -> Result<Route, ConfigError> {
        let RouteConfig {
            name,
            source_topics,
            destination_topic,
            reference_topics,
            fingerprint_fields,
            match_field,
            match_values,
        } = self;

        let label = name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} -> {}", source_topics.join(","), destination_topic));

        if source_topics.is_empty() {
            return Err(ConfigError::NoSourceTopics { route: label });
        }
        if source_topics
            .iter()
            .chain(&reference_topics)
            .chain(std::iter::once(&destination_topic))
            .any(|topic| topic.trim().is_empty())
        {
            return Err(ConfigError::EmptyTopic { route: label });
        }

        let parse = |raw: &str| {
            FieldPath::parse(raw).map_err(|source| ConfigError::InvalidFieldPath {
                route: label.clone(),
                source,
            })
        };

        let strategy = if fingerprint_fields.is_empty() {
            if !reference_topics.is_empty() {
                return Err(ConfigError::ReferenceWithoutFingerprint { route: label });
            }
            MatchStrategy::AllowList(AllowList::new(parse(&match_field)?, match_values))
        } else {
            if !match_values.is_empty() {
                return Err(ConfigError::ConflictingStrategies { route: label });
            }
            let fields = fingerprint_fields
                .iter()
                .map(|raw| parse(raw))
                .collect::<Result<Vec<_>, _>>()?;
            MatchStrategy::Correlation(Correlation::new(fields))
        };

        Ok(Route::new(
            name,
            source_topics,
            destination_topic,
            reference_topics,
            strategy,
        ))
    }
}

impl RoutesFile {
    pub fn from_slice(raw: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Validates every route. Display names must be unique since they key the match store.
    pub fn into_routes(self) -> Result<Vec<Route>, ConfigError> {
        if self.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let route = route.into_route()?;
            if !seen.insert(route.display_name().to_string()) {
                return Err(ConfigError::DuplicateRoute {
                    route: route.display_name().to_string(),
                });
            }
            routes.push(route);
        }
        Ok(routes)
    }
}

pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<Route>, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    RoutesFile::from_slice(&raw)?.into_routes()
}
