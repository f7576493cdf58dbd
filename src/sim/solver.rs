//! Seam to the external hydraulic solver.
//!
//! The solver is an opaque stepping engine: it is opened on a patched model
//! document, advanced one routing step at a time, and queried for node state
//! between steps. Every call blocks.

use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Diagnostic text reported by the solver.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SolverError(pub String);

/// State of one node after a routing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeReading {
    /// Depth above invert (m).
    pub depth: f64,
    /// Total inflow (m3/s), if the engine reports it.
    pub inflow: Option<f64>,
    /// Hydraulic head (m), if the engine reports it.
    pub head: Option<f64>,
    pub invert_elevation: f64,
}

/// An opened model being stepped through its simulation window.
pub trait SolverRun {
    /// Declared simulation start.
    fn start_time(&self) -> NaiveDateTime;

    /// Declared simulation end.
    fn end_time(&self) -> NaiveDateTime;

    /// Ids of every node in the model.
    fn node_ids(&self) -> Vec<String>;

    /// Advances one routing step.
    ///
    /// Returns the new simulation time, or `None` once the end is reached.
    ///
    /// # Errors
    ///
    /// Returns the engine's diagnostic on failure.
    fn step(&mut self) -> Result<Option<NaiveDateTime>, SolverError>;

    /// Current state of node `id`, or `None` if the engine does not know it.
    fn read_node(&self, id: &str) -> Option<NodeReading>;
}

/// Factory for solver runs.
pub trait Solver: Send + Sync + 'static {
    type Run: SolverRun;

    /// Opens the model document at `input`.
    ///
    /// # Errors
    ///
    /// Returns the engine's diagnostic if the document is rejected.
    fn open(&self, input: &Path) -> Result<Self::Run, SolverError>;
}
