//! Coordinates pipeline runs as tracked jobs.
//!
//! Each submission creates a [`Job`] and exactly one task that owns it.
//! The blocking solver work runs on Tokio's blocking pool, optionally under
//! a timeout, and observes a cancellation flag between solver steps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::job::{Job, JobError, JobId, JobState};
use super::store::{JobStore, MemoryJobStore};
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, SimulationRequest};
use crate::sim::executor::PROGRESS_STARTED;
use crate::sim::{RunControl, SimulationResult, Solver};

/// Message recorded on cancelled jobs.
pub const CANCELLED_MESSAGE: &str = "run cancelled";

/// What [`JobManager::get_result`] found.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The job succeeded.
    Completed(Arc<SimulationResult>),
    /// Not succeeded (yet); the current status.
    Status(Job),
}

/// Submits, tracks and cancels simulation jobs.
///
/// Generic over the solver and the job store for static dispatch.
#[derive(Debug)]
pub struct JobManager<S: Solver, J: JobStore = MemoryJobStore> {
    pipeline: Arc<Pipeline<S>>,
    store: J,
    controls: Mutex<HashMap<JobId, RunControl>>,
    timeout: Option<Duration>,
}

impl<S: Solver> JobManager<S, MemoryJobStore> {
    /// A manager backed by an in-memory store.
    pub fn in_memory(pipeline: Arc<Pipeline<S>>, timeout: Option<Duration>) -> Self {
        Self::new(pipeline, MemoryJobStore::new(), timeout)
    }
}

impl<S: Solver, J: JobStore> JobManager<S, J> {
    /// Creates a manager.
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline every job runs through
    /// * `store` - Job table
    /// * `timeout` - Wall-clock limit per run, `None` for unbounded
    pub fn new(pipeline: Arc<Pipeline<S>>, store: J, timeout: Option<Duration>) -> Self {
        Self {
            pipeline,
            store,
            controls: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    /// Queues `request` and returns immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit(self: &Arc<Self>, request: SimulationRequest) -> JobId {
        let (id, _) = self.spawn(request);
        id
    }

    /// Runs `request` to completion and returns its result directly.
    ///
    /// The job runs on its own task, so dropping this future before it
    /// resolves leaves the job running to a terminal state. The job is
    /// recorded and can be queried afterwards.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error that failed the job.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn submit_and_wait(
        self: &Arc<Self>,
        request: SimulationRequest,
    ) -> Result<(JobId, Arc<SimulationResult>), PipelineError> {
        let (id, handle) = self.spawn(request);
        let result = handle
            .await
            .map_err(|e| PipelineError::Simulation(format!("job task aborted: {e}")))??;
        Ok((id, result))
    }

    /// Enqueues `request` and starts the task that owns the job.
    fn spawn(
        self: &Arc<Self>,
        request: SimulationRequest,
    ) -> (JobId, JoinHandle<Result<Arc<SimulationResult>, PipelineError>>) {
        let (id, control) = self.enqueue();
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move { manager.execute(id, request, control).await });
        (id, handle)
    }

    fn enqueue(&self) -> (JobId, RunControl) {
        let job = Job::new();
        let id = job.id;
        let control = RunControl::new();
        self.store.create(job);
        self.controls.lock().insert(id, control.clone());
        info!(job_id = %id, "job queued");
        (id, control)
    }

    async fn execute(
        self: Arc<Self>,
        id: JobId,
        request: SimulationRequest,
        control: RunControl,
    ) -> Result<Arc<SimulationResult>, PipelineError> {
        let outcome = self.run(id, request, &control).await;
        self.controls.lock().remove(&id);

        let recorded = match &outcome {
            Ok(result) => {
                let result = Arc::clone(result);
                self.store.update(id, &mut |job| job.succeed(Arc::clone(&result)))
            }
            Err(e) => {
                let message = e.to_string();
                let progress = control.progress();
                self.store.update(id, &mut |job| {
                    job.progress = job.progress.max(progress);
                    job.fail(message.clone())
                })
            }
        };
        match recorded {
            Ok(job) => info!(job_id = %id, state = %job.state, "job finished"),
            // Cancelled while the run was finishing; the recorded state stands.
            Err(e) => debug!(job_id = %id, error = %e, "job outcome not recorded"),
        }
        outcome
    }

    async fn run(
        &self,
        id: JobId,
        request: SimulationRequest,
        control: &RunControl,
    ) -> Result<Arc<SimulationResult>, PipelineError> {
        let started = self.store.update(id, &mut |job| {
            job.transition(JobState::Running)?;
            job.progress = PROGRESS_STARTED;
            Ok(())
        });
        if started.is_err() {
            return Err(PipelineError::Cancelled);
        }
        control.set_progress(PROGRESS_STARTED);
        info!(job_id = %id, "job running");

        let pipeline = Arc::clone(&self.pipeline);
        let run_control = control.clone();
        let handle =
            tokio::task::spawn_blocking(move || pipeline.run(&request, &run_control));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    control.cancel();
                    warn!(job_id = %id, seconds = limit.as_secs(), "job timed out");
                    return Err(PipelineError::Timeout(limit));
                }
            },
            None => handle.await,
        };
        let result = joined
            .map_err(|e| PipelineError::Simulation(format!("run task aborted: {e}")))??;
        Ok(Arc::new(result))
    }

    /// Current metadata of a job, with live progress for running jobs.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id.
    pub fn get_status(&self, id: JobId) -> Result<Job, JobError> {
        let mut job = self.store.get(id).ok_or(JobError::NotFound(id))?;
        if job.state == JobState::Running {
            if let Some(control) = self.controls.lock().get(&id) {
                job.progress = job.progress.max(control.progress());
            }
        }
        Ok(job)
    }

    /// The result once the job succeeded, otherwise its current status.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id.
    pub fn get_result(&self, id: JobId) -> Result<JobOutcome, JobError> {
        let job = self.get_status(id)?;
        match (&job.state, &job.result) {
            (JobState::Succeeded, Some(result)) => Ok(JobOutcome::Completed(Arc::clone(result))),
            _ => Ok(JobOutcome::Status(job)),
        }
    }

    /// Cancels a queued or running job, recording it as failed.
    ///
    /// A running job stops at its next solver step. Returns `false` if the
    /// job had already finished.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id.
    pub fn cancel(&self, id: JobId) -> Result<bool, JobError> {
        if let Some(control) = self.controls.lock().get(&id) {
            control.cancel();
        }
        match self.store.update(id, &mut |job| job.fail(CANCELLED_MESSAGE)) {
            Ok(_) => {
                info!(job_id = %id, "job cancelled");
                Ok(true)
            }
            Err(JobError::InvalidTransition { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }
}
