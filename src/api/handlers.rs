//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::AppState;
use super::types::{CancelResponse, ErrorResponse, RunMode, StatusResponse, SubmitQuery, SubmitResponse};
use crate::error::PipelineError;
use crate::jobs::{JobError, JobId, JobOutcome, JobState};
use crate::model::Node;
use crate::pipeline::SimulationRequest;
use crate::sim::Solver;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn pipeline_error(e: PipelineError) -> ApiError {
    let status = match &e {
        _ if e.is_client_error() => StatusCode::BAD_REQUEST,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}

fn job_error(e: JobError) -> ApiError {
    match e {
        JobError::NotFound(_) => error(StatusCode::NOT_FOUND, e.to_string()),
        JobError::InvalidTransition { .. } => error(StatusCode::CONFLICT, e.to_string()),
    }
}

fn parse_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| error(StatusCode::NOT_FOUND, format!("job not found: {raw}")))
}

/// Runs or queues a simulation request.
///
/// `POST /simulations?mode=sync` → 200 + `SimulationResult` JSON
/// `POST /simulations?mode=async` → 202 + `SubmitResponse` JSON
/// Malformed series or template → 400; unknown node in the filter → 404.
pub async fn submit<S: Solver>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<SubmitQuery>,
    Json(request): Json<SimulationRequest>,
) -> Result<Response, ApiError> {
    match query.mode {
        RunMode::Sync => {
            let (_, result) = state
                .manager
                .submit_and_wait(request)
                .await
                .map_err(pipeline_error)?;
            Ok(Json(result.as_ref().clone()).into_response())
        }
        RunMode::Async => {
            let job_id = state.manager.submit(request);
            let job_state = state
                .manager
                .get_status(job_id)
                .map_or(JobState::Queued, |job| job.state);
            let body = SubmitResponse {
                job_id,
                state: job_state,
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

/// `GET /simulations/{id}` → 200 + job JSON, 404 if unknown.
pub async fn get_status<S: Solver>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let job = state.manager.get_status(id).map_err(job_error)?;
    Ok(Json(job).into_response())
}

/// `GET /simulations/{id}/result` → 200 + `SimulationResult` once
/// succeeded, otherwise 200 + `StatusResponse`.
pub async fn get_result<S: Solver>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    match state.manager.get_result(id).map_err(job_error)? {
        JobOutcome::Completed(result) => Ok(Json(result.as_ref().clone()).into_response()),
        JobOutcome::Status(job) => Ok(Json(StatusResponse {
            job_id: job.id,
            state: job.state,
            progress: job.progress,
            error: job.error,
        })
        .into_response()),
    }
}

/// `POST /simulations/{id}/cancel` → 200 + `CancelResponse`.
pub async fn cancel<S: Solver>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let job_id = parse_id(&id)?;
    let cancelled = state.manager.cancel(job_id).map_err(job_error)?;
    Ok(Json(CancelResponse { job_id, cancelled }))
}

/// `GET /nodes` → 200 + node registry JSON.
pub async fn list_nodes<S: Solver>(State(state): State<Arc<AppState<S>>>) -> Json<Vec<Node>> {
    Json(state.manager.pipeline().nodes().iter().cloned().collect())
}

/// `GET /nodes/{id}` → 200 + one node, 404 if the template does not declare it.
pub async fn get_node<S: Solver>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    state
        .manager
        .pipeline()
        .nodes()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| pipeline_error(PipelineError::NotFound(format!("node \"{id}\""))))
}
