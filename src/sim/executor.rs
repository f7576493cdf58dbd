//! Runs a patched document through the solver and samples its trace.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{Duration as SimDuration, NaiveDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::{CacheKey, ResultCache};
use super::sampler::ResultSampler;
use super::solver::{Solver, SolverRun};
use super::types::NodeResults;
use crate::error::{PipelineError, Result};

/// Progress reported when the solver starts.
pub const PROGRESS_STARTED: f64 = 0.1;
/// Progress reported when the solver reaches its end time.
pub const PROGRESS_SOLVED: f64 = 0.9;

/// Cancellation flag and progress gauge shared between a run and its owner.
///
/// Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    progress: Arc<AtomicU64>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop at its next solver step.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Progress estimate in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub fn set_progress(&self, value: f64) {
        self.progress
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Bounded retry for removing working files the solver may still hold open.
#[derive(Debug, Clone, Copy)]
pub struct CleanupPolicy {
    pub attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub backoff: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CleanupPolicy {
    /// Removes `dir` recursively, retrying with exponential backoff.
    ///
    /// Returns `false` if the directory is still present after the last
    /// attempt. Failure is logged, never raised.
    pub fn remove_dir(&self, dir: &Path) -> bool {
        let mut delay = self.backoff;
        for attempt in 1..=self.attempts.max(1) {
            match fs::remove_dir_all(dir) {
                Ok(()) => return true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
                Err(e) => {
                    warn!(path = %dir.display(), attempt, error = %e, "cleanup failed");
                    if attempt < self.attempts {
                        std::thread::sleep(delay);
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }
        warn!(path = %dir.display(), "giving up on working directory cleanup");
        false
    }
}

/// Executes patched documents with a [`Solver`].
///
/// Generic over `S: Solver` for static dispatch. Each run gets its own
/// working directory, so concurrent runs never share working files.
#[derive(Debug)]
pub struct SimulationExecutor<S: Solver> {
    solver: S,
    cache: ResultCache,
    work_dir: PathBuf,
    capture_every_minutes: u32,
    cleanup: CleanupPolicy,
}

impl<S: Solver> SimulationExecutor<S> {
    /// Creates an executor.
    ///
    /// # Arguments
    ///
    /// * `solver` - Hydraulic engine
    /// * `cache` - Result cache consulted before and filled after each run
    /// * `work_dir` - Parent of the per-run working directories
    /// * `capture_every_minutes` - Sampling cadence
    /// * `cleanup` - Working directory removal policy
    pub fn new(
        solver: S,
        cache: ResultCache,
        work_dir: impl Into<PathBuf>,
        capture_every_minutes: u32,
        cleanup: CleanupPolicy,
    ) -> Self {
        Self {
            solver,
            cache,
            work_dir: work_dir.into(),
            capture_every_minutes,
            cleanup,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Runs `document`, or returns the cached results stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Simulation`] with the solver's diagnostic,
    /// [`PipelineError::Cancelled`] if `control` was cancelled mid-run, or
    /// [`PipelineError::Io`] if the working document cannot be written. No
    /// partial results are returned.
    pub fn execute(&self, document: &str, key: CacheKey, control: &RunControl) -> Result<NodeResults> {
        if let Some(results) = self.cache.load(key) {
            control.set_progress(PROGRESS_SOLVED);
            return Ok(results);
        }

        let run_dir = self.work_dir.join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir_all(&run_dir).map_err(|e| PipelineError::io(&run_dir, e))?;
        let input = run_dir.join("model.inp");

        let outcome = fs::write(&input, document)
            .map_err(|e| PipelineError::io(&input, e))
            .and_then(|()| self.run_solver(&input, control));
        self.cleanup.remove_dir(&run_dir);
        let results = outcome?;

        if let Err(e) = self.cache.store(key, &results) {
            warn!(%key, error = %e, "could not cache results");
        }
        Ok(results)
    }

    fn run_solver(&self, input: &Path, control: &RunControl) -> Result<NodeResults> {
        let mut run = self
            .solver
            .open(input)
            .map_err(|e| PipelineError::Simulation(e.to_string()))?;
        let (start, end) = (run.start_time(), run.end_time());
        let nodes = run.node_ids();
        info!(%start, %end, nodes = nodes.len(), "solver started");
        control.set_progress(PROGRESS_STARTED);

        let total = (end - start).num_seconds().max(1) as f64;
        let mut sampler = ResultSampler::new(self.capture_every_minutes);
        let mut next_report = start + SimDuration::hours(24);
        let mut steps = 0u64;

        capture_nodes(&mut sampler, &run, &nodes, start);

        loop {
            if control.is_cancelled() {
                info!(steps, "solver run cancelled");
                return Err(PipelineError::Cancelled);
            }
            let Some(t) = run
                .step()
                .map_err(|e| PipelineError::Simulation(e.to_string()))?
            else {
                break;
            };
            steps += 1;

            capture_nodes(&mut sampler, &run, &nodes, t);

            let fraction = ((t - start).num_seconds() as f64 / total).clamp(0.0, 1.0);
            control.set_progress(PROGRESS_STARTED + (PROGRESS_SOLVED - PROGRESS_STARTED) * fraction);
            if t >= next_report {
                debug!(%t, steps, "solver progress");
                next_report += SimDuration::hours(24);
            }
        }

        let results = sampler.finish();
        info!(steps, nodes = results.len(), "solver finished");
        Ok(results)
    }
}

/// Reads every node at `t` when the step is on the capture cadence.
fn capture_nodes<R: SolverRun>(sampler: &mut ResultSampler, run: &R, nodes: &[String], t: NaiveDateTime) {
    if !sampler.qualifies(t) {
        return;
    }
    for id in nodes {
        if let Some(reading) = run.read_node(id) {
            sampler.capture(id, t, &reading);
        }
    }
}
