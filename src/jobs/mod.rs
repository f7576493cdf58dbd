//! Asynchronous job tracking around the pipeline.

pub mod job;
pub mod manager;
pub mod store;

pub use job::{Job, JobError, JobId, JobState};
pub use manager::{CANCELLED_MESSAGE, JobManager, JobOutcome};
pub use store::{JobStore, MemoryJobStore};
