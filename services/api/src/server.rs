use crate::cli::ServeArgs;
use crate::infra::{counselling_config_summary, AppState};
use crate::routes::with_counselling_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use seat_counselling::config::AppConfig;
use seat_counselling::counselling::{CounsellingService, MemoryRepository, RandomizedGateway};
use seat_counselling::error::AppError;
use seat_counselling::telemetry;
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

    let repository = Arc::new(MemoryRepository::new());
    let gateway = Arc::new(RandomizedGateway::new(
        config.counselling.payment_success_rate,
    ));
    let service = Arc::new(CounsellingService::new(
        repository,
        gateway,
        config.counselling,
    )?);

    let app = with_counselling_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        counselling = %counselling_config_summary(&config.counselling),
        "seat counselling service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
