//! Job store abstraction.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::job::{Job, JobError, JobId};

/// Shared table of jobs.
///
/// Implementations must apply [`JobStore::update`] atomically: the closure
/// sees the current record and its changes are kept only if it succeeds.
pub trait JobStore: Send + Sync + 'static {
    /// Inserts a new job.
    fn create(&self, job: Job);

    /// Returns a copy of the job.
    fn get(&self, id: JobId) -> Option<Job>;

    /// Applies `f` to the stored job and returns the updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id, or whatever `f` returns.
    fn update(
        &self,
        id: JobId,
        f: &mut dyn FnMut(&mut Job) -> Result<(), JobError>,
    ) -> Result<Job, JobError>;

    /// All jobs, oldest first.
    fn list(&self) -> Vec<Job>;
}

/// In-process store backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job: Job) {
        self.jobs.write().insert(job.id, job);
    }

    fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().get(&id).cloned()
    }

    fn update(
        &self,
        id: JobId,
        f: &mut dyn FnMut(&mut Job) -> Result<(), JobError>,
    ) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write();
        let stored = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        let mut draft = stored.clone();
        f(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }

    fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}
