use anyhow::{Context, Result};
use axum::{routing::get, Router};
use envconfig::Envconfig;
use futures::future::ready;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kafka_router::{config::Config, service::RouterService};

pub async fn index() -> &'static str {
    "kafka router"
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install prometheus recorder")
}

fn start_server(config: &Config, recorder: PrometheusHandle) -> JoinHandle<()> {
    let router = Router::new()
        .route("/", get(index))
        .route("/_liveness", get(|| ready("ok")))
        .route("/metrics", get(move || ready(recorder.render())));

    let bind = config.bind_address();

    tokio::task::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&bind).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("failed to bind metrics server on {bind}: {e:#}");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, router).await {
            error!("metrics server stopped: {e:#}");
        }
    })
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("failed to install SIGTERM handler: {e:#}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl+c: {e:#}");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting kafka router");

    let config = Config::init_from_env()
        .context("Failed to load configuration from environment variables")?;

    info!("Configuration loaded: {:?}", config);

    let service = RouterService::from_config(config.clone())?;

    let recorder = setup_metrics_recorder()?;
    let server_handle = start_server(&config, recorder);
    info!("Started metrics server on {}", config.bind_address());

    service.run_with_shutdown(shutdown_signal()).await?;

    server_handle.abort();

    Ok(())
}
