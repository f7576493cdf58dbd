//! Solver execution, result sampling and caching.

pub mod cache;
pub mod executor;
pub mod sampler;
pub mod scripted;
pub mod solver;
pub mod types;

pub use cache::{CacheKey, ResultCache};
pub use executor::{CleanupPolicy, RunControl, SimulationExecutor};
pub use sampler::ResultSampler;
pub use scripted::ScriptedSolver;
pub use solver::{NodeReading, Solver, SolverError, SolverRun};
pub use types::{NodeResult, NodeResults, NodeSample, SimulationResult};
