use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    admin::{AdminClient, Credentials, Signer},
    builder::SnapshotBuilder,
    config::Config,
    handlers::{self, AppState},
    logging::Redacted,
    metrics,
    registry::MetricRegistry,
    scheduler::RefreshScheduler,
    signals::setup_signal_handlers,
};

/// Start the exporter
///
/// This function:
/// 1. Installs the self-metrics recorder
/// 2. Spawns the refresh scheduler
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Serves scrapes until a shutdown signal arrives
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = metrics::init_metrics()?;

    let registry = Arc::new(MetricRegistry::new());
    let scheduler = create_scheduler(&config, Arc::clone(&registry))?;
    let refresh_handle = scheduler.spawn();

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(AppState::new(registry, Some(metrics_handle)));

    let addr = config.server.socket_addr()?;
    info!("Serving metrics on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    refresh_handle.abort();
    signal_handle.abort();

    info!("Exporter stopped");
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Wire admin client, builder and scheduler from configuration.
///
/// Missing credentials are not fatal: requests go out unsigned and the
/// gateway decides.
pub fn create_scheduler(config: &Config, registry: Arc<MetricRegistry>) -> Result<RefreshScheduler> {
    let signer = match Credentials::from_env() {
        Some(credentials) => {
            let signer = Signer::new(
                credentials,
                config.signing.region.clone(),
                config.signing.service.clone(),
            );
            info!(
                access_key = %Redacted::new(signer.access_key_id()),
                region = %config.signing.region,
                "Signing admin requests"
            );
            Some(signer)
        }
        None => {
            warn!("AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY not set, admin requests will be unsigned");
            None
        }
    };

    let client = AdminClient::new(&config.endpoint, signer, config.refresh.timeout())?;
    info!(endpoint = %client.endpoint(), "Polling RGW admin API");

    let builder = SnapshotBuilder::new(
        Arc::new(client),
        config.refresh.concurrency,
        config.refresh.timeout(),
    );

    Ok(RefreshScheduler::new(builder, registry, config.refresh.interval())
        .with_jitter(config.refresh.jitter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_serves_all_routes() {
        let app = create_router(AppState::new(Arc::new(MetricRegistry::new()), None));

        for (path, expected) in [
            ("/health", StatusCode::OK),
            ("/ready", StatusCode::SERVICE_UNAVAILABLE),
            ("/metrics", StatusCode::OK),
            ("/nope", StatusCode::NOT_FOUND),
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{path}");
        }
    }
}
