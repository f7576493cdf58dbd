//! Orchestration of flood simulation runs around an external hydraulic solver.
//!
//! A run resamples boundary series onto an hourly grid, injects them into a
//! template model document, steps the solver while sampling node depths,
//! and classifies flood risk per node. Runs are tracked as jobs.

pub mod config;
pub mod error;
pub mod flood;
pub mod io;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod series;
pub mod sim;

#[cfg(feature = "api")]
pub mod api;

pub use error::{PipelineError, Result};
