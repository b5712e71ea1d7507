use crate::cli::ServeArgs;
use crate::infra::{build_services, AppState};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use estate_desk::config::AppConfig;
use estate_desk::error::AppError;
use estate_desk::telemetry;
use estate_desk::workflows::{PipelineError, SystemClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (services, _outbox) =
        build_services(&config.store, Arc::new(SystemClock)).map_err(PipelineError::from)?;

    let app = with_pipeline_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        seeded = config.store.seed_demo_data,
        lock_timeout_ms = config.store.lock_timeout.as_millis() as u64,
        "estate desk pipeline ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
