//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::jobs::{JobId, JobState};

/// How `POST /simulations` runs its request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run inline and return the result.
    Sync,
    /// Queue and return a job id.
    #[default]
    Async,
}

/// Query parameters for `POST /simulations`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub mode: RunMode,
}

/// Body of `202 Accepted` for queued runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub state: JobState,
}

/// Status returned by the result endpoint while no result exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /simulations/{id}/cancel`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    /// `false` if the job had already finished.
    pub cancelled: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error description.
    pub error: String,
}
