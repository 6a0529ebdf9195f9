use crate::cli::ServeArgs;
use crate::infra::{load_hierarchy, AppState, ConfiguredRepository};
use crate::routes::with_scorecard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scorecard::assessment::{AssessmentEngine, AssessmentService, AssessmentServiceError};
use scorecard::config::{AppConfig, EngineConfig};
use scorecard::error::AppError;
use scorecard::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    config.server.host = args.host.unwrap_or(config.server.host);
    config.server.port = args.port.unwrap_or(config.server.port);

    telemetry::init(&config.telemetry)?;

    let service = Arc::new(assessment_service(&config.engine)?);
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let ready = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: ready.clone(),
        metrics: Arc::new(prometheus_handle),
    };
    let app = with_scorecard_routes(service)
        .layer(Extension(state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    ready.store(true, Ordering::Release);
    info!(?config.environment, %addr, "assessment scorecard service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn assessment_service(
    engine_config: &EngineConfig,
) -> Result<AssessmentService<ConfiguredRepository>, AppError> {
    let (imported, matcher) = load_hierarchy(engine_config)?;
    let engine = Arc::new(AssessmentEngine::new(Arc::new(imported.hierarchy)));
    let repository =
        ConfiguredRepository::from_config(engine_config).map_err(AssessmentServiceError::from)?;
    Ok(AssessmentService::new(Arc::new(repository), engine).with_matcher(matcher))
}
