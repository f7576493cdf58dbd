//! Job records and their state machine.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sim::types::SimulationResult;

/// Opaque job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// A queued job may fail without running (cancellation); nothing leaves
    /// a terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Job bookkeeping errors.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },
}

/// A tracked simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    /// Estimate in `[0, 1]`.
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub result: Option<Arc<SimulationResult>>,
}

impl Job {
    /// A fresh queued job.
    pub fn new() -> Self {
        Self {
            id: JobId::new(),
            state: JobState::Queued,
            progress: 0.0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
            result: None,
        }
    }

    /// Moves to `next`, stamping start and end times.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] if the move is illegal; the
    /// job is left untouched.
    pub fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        let now = Utc::now();
        if next == JobState::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.ended_at = Some(now);
        }
        self.state = next;
        Ok(())
    }

    /// Records success.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] unless the job is running.
    pub fn succeed(&mut self, result: Arc<SimulationResult>) -> Result<(), JobError> {
        self.transition(JobState::Succeeded)?;
        self.progress = 1.0;
        self.result = Some(result);
        Ok(())
    }

    /// Records failure with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] if the job is already terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobState::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}
