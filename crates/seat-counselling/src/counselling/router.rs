use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{
    CounsellingPhase, CourseId, CourseRegistration, PaymentMethod, StudentId, StudentRegistration,
};
use super::error::CounsellingError;
use super::export::write_csv;
use super::payment::PaymentGateway;
use super::repository::CounsellingRepository;
use super::service::CounsellingService;

/// Body of a preference submission, most wanted course first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSubmission {
    pub course_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PhaseView {
    phase: CounsellingPhase,
    label: &'static str,
}

impl From<CounsellingPhase> for PhaseView {
    fn from(phase: CounsellingPhase) -> Self {
        Self {
            phase,
            label: phase.label(),
        }
    }
}

/// Router builder exposing the counselling operations over HTTP.
pub fn counselling_router<R, G>(service: Arc<CounsellingService<R, G>>) -> Router
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    Router::new()
        .route("/api/v1/counselling/phase", get(phase_handler::<R, G>))
        .route(
            "/api/v1/counselling/phase/registration",
            post(open_registration_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/phase/preferences",
            post(open_preferences_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/allocation/run",
            post(run_allocation_handler::<R, G>),
        )
        .route("/api/v1/counselling/reset", post(reset_handler::<R, G>))
        .route(
            "/api/v1/counselling/statistics",
            get(statistics_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/allocations",
            get(allocations_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/allocations.csv",
            get(allocations_csv_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/students",
            post(register_student_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/students/:student_id",
            get(student_status_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/students/:student_id/preferences",
            put(submit_preferences_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/students/:student_id/payment",
            post(payment_handler::<R, G>),
        )
        .route(
            "/api/v1/counselling/courses",
            post(add_course_handler::<R, G>),
        )
        .with_state(service)
}

/// Maps the core taxonomy onto HTTP statuses.
pub(crate) fn error_response(error: CounsellingError) -> Response {
    let status = match &error {
        CounsellingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CounsellingError::Phase { .. } | CounsellingError::Concurrency => StatusCode::CONFLICT,
        CounsellingError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        CounsellingError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, CounsellingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn phase_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    (StatusCode::OK, Json(PhaseView::from(service.phase()))).into_response()
}

pub(crate) async fn open_registration_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(
        StatusCode::OK,
        service.open_registration().map(PhaseView::from),
    )
}

pub(crate) async fn open_preferences_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(
        StatusCode::OK,
        service.open_preferences().map(PhaseView::from),
    )
}

pub(crate) async fn run_allocation_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(StatusCode::OK, service.run_allocation())
}

pub(crate) async fn reset_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(
        StatusCode::OK,
        service
            .reset_system()
            .map(|()| PhaseView::from(CounsellingPhase::Setup)),
    )
}

pub(crate) async fn statistics_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(StatusCode::OK, service.statistics())
}

pub(crate) async fn allocations_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(StatusCode::OK, service.export_allocations())
}

pub(crate) async fn allocations_csv_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    let rows = match service.export_allocations() {
        Ok(rows) => rows,
        Err(error) => return error_response(error),
    };

    let mut buffer = Vec::new();
    if let Err(err) = write_csv(&rows, &mut buffer) {
        error!(error = %err, "failed to render allocation csv");
        let payload = json!({ "error": err.to_string() });
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"allocation_results.csv\"",
            ),
        ],
        buffer,
    )
        .into_response()
}

pub(crate) async fn register_student_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
    Json(registration): Json<StudentRegistration>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(StatusCode::CREATED, service.register_student(registration))
}

pub(crate) async fn add_course_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
    Json(registration): Json<CourseRegistration>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(StatusCode::CREATED, service.add_course(registration))
}

pub(crate) async fn student_status_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(
        StatusCode::OK,
        service.student_status(&StudentId(student_id)),
    )
}

pub(crate) async fn submit_preferences_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
    Path(student_id): Path<String>,
    Json(submission): Json<PreferenceSubmission>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    let course_ids = submission.course_ids.into_iter().map(CourseId).collect();
    respond(
        StatusCode::OK,
        service.submit_preferences(&StudentId(student_id), course_ids),
    )
}

pub(crate) async fn payment_handler<R, G>(
    State(service): State<Arc<CounsellingService<R, G>>>,
    Path(student_id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> Response
where
    R: CounsellingRepository + 'static,
    G: PaymentGateway + 'static,
{
    respond(
        StatusCode::OK,
        service.process_payment(&StudentId(student_id), request.method),
    )
}
