//! The resample, compose, execute, classify pipeline.
//!
//! Every entry point (synchronous requests, queued jobs and the CLI) runs
//! requests through [`Pipeline::run`].

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{PipelineError, Result};
use crate::flood::{FloodAssessment, FloodMethod};
use crate::model::{
    FallbackPolicy, FallbackProfile, ModelComposer, ModelTemplate, Node, NodeRegistry,
    SubstringFallbackPolicy,
};
use crate::series::timefmt::parse_timestamp;
use crate::series::{Boundaries, RawSeries, SimulationWindow};
use crate::sim::{
    CacheKey, CleanupPolicy, ResultCache, RunControl, SimulationExecutor, SimulationResult,
    Solver,
};

/// One simulation request as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Simulation start, `MM/DD/YYYY[ HH:MM]` or ISO 8601.
    pub start_date: String,
    /// Simulation end, same formats as `start_date`.
    pub end_date: String,
    /// Boundary series at arbitrary spacing.
    #[serde(default)]
    pub boundaries: Boundaries<RawSeries>,
    /// Restrict the result to these node ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,
}

impl SimulationRequest {
    /// Parses the start/end pair.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] keyed on the offending field.
    pub fn window(&self) -> Result<SimulationWindow> {
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        SimulationWindow::new(start, end)
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDateTime> {
    parse_timestamp(value)
        .ok_or_else(|| PipelineError::format(field, format!("invalid date \"{value}\"")))
}

/// The canonical pipeline bound to one template and one solver.
#[derive(Debug)]
pub struct Pipeline<S: Solver> {
    template: ModelTemplate,
    registry: NodeRegistry,
    policy: Arc<dyn FallbackPolicy>,
    composer: ModelComposer,
    executor: SimulationExecutor<S>,
    method: FloodMethod,
}

impl<S: Solver> Pipeline<S> {
    /// Builds a pipeline using the substring fallback policy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `config` fails validation, or
    /// [`PipelineError::Structural`] if the registry is strict and the
    /// template lacks a node table.
    pub fn new(config: &ServiceConfig, template: ModelTemplate, solver: S) -> Result<Self> {
        let policy = Arc::new(SubstringFallbackPolicy::from_config(&config.registry));
        Self::with_policy(config, template, solver, policy)
    }

    /// Builds a pipeline with a custom [`FallbackPolicy`].
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::new`].
    pub fn with_policy(
        config: &ServiceConfig,
        template: ModelTemplate,
        solver: S,
        policy: Arc<dyn FallbackPolicy>,
    ) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(PipelineError::Config(messages.join("; ")));
        }
        let registry = NodeRegistry::parse(template.text(), &config.registry, policy.as_ref())?;

        let flood = &config.flood;
        let method = FloodMethod::from_name(&flood.method, flood.threshold, flood.default_capacity)
            .ok_or_else(|| PipelineError::Config(format!("unknown flood method \"{}\"", flood.method)))?;

        let cache = ResultCache::new(&config.paths.cache_dir, config.cache.enabled);
        let cleanup = CleanupPolicy {
            attempts: config.jobs.cleanup_retries,
            backoff: std::time::Duration::from_millis(config.jobs.cleanup_backoff_ms),
        };
        let executor = SimulationExecutor::new(
            solver,
            cache,
            &config.paths.work_dir,
            config.sampling.capture_every_minutes,
            cleanup,
        );

        Ok(Self {
            template,
            registry,
            policy,
            composer: ModelComposer::new(config.boundary.clone()),
            executor,
            method,
        })
    }

    pub fn template(&self) -> &ModelTemplate {
        &self.template
    }

    /// Nodes declared by the template.
    pub fn nodes(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Runs one request end to end.
    ///
    /// # Errors
    ///
    /// Format and structural errors abort before the solver starts;
    /// simulation, timeout and cancellation errors abort without partial
    /// results; [`PipelineError::NotFound`] if the node filter names a node
    /// the run did not produce.
    pub fn run(&self, request: &SimulationRequest, control: &RunControl) -> Result<SimulationResult> {
        let window = request.window()?;
        let series = request.boundaries.resample()?;
        debug!(
            rain = series.rain.len(),
            inflow_a = series.inflow_a.len(),
            inflow_b = series.inflow_b.len(),
            tide = series.tide.len(),
            "resampled boundary series"
        );

        let document = self.composer.compose(self.template.text(), &series, &window)?;
        let key = CacheKey::derive(self.template.version(), &series, &window);
        let nodes = self.executor.execute(&document, key, control)?;

        let flood = nodes
            .values()
            .map(|result| {
                let assessment = match self.registry.get(&result.node) {
                    Some(node) => FloodAssessment::assess(self.method, node, result),
                    None => {
                        let node = self.unregistered_node(&result.node);
                        FloodAssessment::assess(self.method, &node, result)
                    }
                };
                (result.node.clone(), assessment)
            })
            .collect();

        let result = SimulationResult { nodes, flood };
        info!(nodes = result.len(), start = %window.start, end = %window.end, "simulation complete");
        match &request.nodes {
            Some(ids) if !ids.is_empty() => result.filter_nodes(ids),
            _ => Ok(result),
        }
    }

    /// Geometry for a node the solver reported but the template does not declare.
    fn unregistered_node(&self, id: &str) -> Node {
        let profile = self.policy.fallback_for(id);
        let node = Node::from_profile(
            id,
            &FallbackProfile {
                kind: self.policy.infer_kind(id),
                ..profile
            },
        );
        debug!(node = id, kind = %node.kind, "assessing unregistered node with fallback profile");
        node
    }
}
