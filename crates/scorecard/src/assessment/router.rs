use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::repository::{AssessmentId, AssessmentRepository, RepositoryError};
use super::result::CriterionOverride;
use super::service::{AssessmentService, AssessmentServiceError, NewAssessment};
use crate::formula::PreviewRequest;
use crate::store::StoreError;

const DEFAULT_LIST_LIMIT: usize = 50;

/// Router builder exposing the hierarchy, assessment sessions and formula previews.
pub fn assessment_router<R>(service: Arc<AssessmentService<R>>) -> Router
where
    R: AssessmentRepository + 'static,
{
    Router::new()
        .route("/api/v1/hierarchy", get(hierarchy_handler::<R>))
        .route("/api/v1/formulas/preview", post(preview_handler::<R>))
        .route(
            "/api/v1/assessments",
            get(list_handler::<R>).post(create_handler::<R>),
        )
        .route("/api/v1/assessments/:assessment_id", get(detail_handler::<R>))
        .route(
            "/api/v1/assessments/:assessment_id/values",
            put(values_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/overrides",
            put(overrides_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/calculate",
            post(calculate_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/result",
            get(result_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/report",
            get(report_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/export",
            get(export_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/history",
            get(history_handler::<R>),
        )
        .route(
            "/api/v1/assessments/:assessment_id/history/:version/restore",
            post(restore_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    pillar: Option<String>,
}

pub(crate) async fn hierarchy_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    (StatusCode::OK, Json(service.hierarchy().outline())).into_response()
}

pub(crate) async fn preview_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Json(request): Json<PreviewRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    if request.formula.trim().is_empty() {
        let payload = json!({ "error": "formula must not be empty" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }
    (StatusCode::OK, Json(service.preview(&request))).into_response()
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.list(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))).await {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.summary_view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Json(request): Json<NewAssessment>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.create(request)).await {
        Ok(record) => (StatusCode::CREATED, Json(record.summary_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.get(&AssessmentId(assessment_id))).await {
        Ok(record) => {
            let payload = json!({
                "assessment": record.summary_view(),
                "values": record.store.values(),
                "overrides": record.overrides,
                "pending_data_points": record.pending_data_points,
                "pending_criteria": record.pending_criteria,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn values_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
    Json(values): Json<BTreeMap<String, String>>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.record_values(&AssessmentId(assessment_id), &values)).await {
        Ok(record) => (StatusCode::OK, Json(record.summary_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn overrides_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
    Json(overrides): Json<BTreeMap<String, Option<CriterionOverride>>>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.set_overrides(&AssessmentId(assessment_id), &overrides)).await {
        Ok(record) => (StatusCode::OK, Json(record.summary_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn calculate_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.calculate(&AssessmentId(assessment_id))).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn result_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.result(&AssessmentId(assessment_id))).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn report_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.report(&AssessmentId(assessment_id))).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn export_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    let id = AssessmentId(assessment_id);
    let export_id = id.clone();
    let exported = off_runtime(service, move |service| {
        service.export_csv(&export_id, query.pillar.as_deref())
    });
    match exported.await {
        Ok(body) => {
            let disposition = format!("attachment; filename=\"{id}.csv\"");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path(assessment_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.history(&AssessmentId(assessment_id))).await {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn restore_handler<R>(
    State(service): State<Arc<AssessmentService<R>>>,
    Path((assessment_id, version)): Path<(String, u32)>,
) -> Response
where
    R: AssessmentRepository + 'static,
{
    match off_runtime(service, move |service| service.restore(&AssessmentId(assessment_id), version)).await {
        Ok(record) => (StatusCode::OK, Json(record.summary_view())).into_response(),
        Err(error) => error_response(error),
    }
}

/// Run a service call on the blocking pool; file-backed repositories do synchronous I/O.
async fn off_runtime<R, T, F>(
    service: Arc<AssessmentService<R>>,
    task: F,
) -> Result<T, AssessmentServiceError>
where
    R: AssessmentRepository + 'static,
    T: Send + 'static,
    F: FnOnce(&AssessmentService<R>) -> Result<T, AssessmentServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || task(&service))
        .await
        .map_err(|error| AssessmentServiceError::Worker(error.to_string()))?
}

fn error_response(error: AssessmentServiceError) -> Response {
    let status = match &error {
        AssessmentServiceError::Store(StoreError::UnknownDataPoint(_))
        | AssessmentServiceError::UnknownCriterion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Repository(RepositoryError::NotFound)
        | AssessmentServiceError::UnknownVersion(_) => StatusCode::NOT_FOUND,
        AssessmentServiceError::Repository(RepositoryError::Conflict)
        | AssessmentServiceError::NoResult(_) => StatusCode::CONFLICT,
        AssessmentServiceError::Store(_)
        | AssessmentServiceError::Repository(RepositoryError::Unavailable(_))
        | AssessmentServiceError::Export(_)
        | AssessmentServiceError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
