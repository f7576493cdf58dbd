//! Result types produced by a simulation run.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::flood::FloodAssessment;
use crate::series::timefmt;

/// One captured reading of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSample {
    /// Capture instant, serialized as `MM/DD/YYYY HH:MM`.
    #[serde(with = "timefmt::canonical")]
    pub time: NaiveDateTime,
    /// Water depth above invert (m).
    pub depth: f64,
    /// Total inflow (m3/s), 0 when the solver does not report it.
    pub inflow: f64,
    /// Hydraulic head (m); `invert_elevation + depth` when not reported.
    pub water_level: f64,
    pub invert_elevation: f64,
}

/// Sampled series and peaks of one node. Field names follow the cache schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node: String,
    pub max_depth_m: f64,
    pub max_water_level_m: f64,
    pub invert_elevation: f64,
    pub time_series: Vec<NodeSample>,
}

impl NodeResult {
    /// Builds a result from samples, computing both peaks.
    ///
    /// Returns `None` when `samples` is empty.
    pub fn from_samples(node: &str, samples: Vec<NodeSample>) -> Option<Self> {
        let first = samples.first()?;
        let invert_elevation = first.invert_elevation;
        let max_depth_m = samples.iter().map(|s| s.depth).fold(f64::MIN, f64::max);
        let max_water_level_m = samples
            .iter()
            .map(|s| s.water_level)
            .fold(f64::MIN, f64::max);
        Some(Self {
            node: node.to_string(),
            max_depth_m,
            max_water_level_m,
            invert_elevation,
            time_series: samples,
        })
    }
}

/// Per-node results of one run, keyed by node id.
pub type NodeResults = BTreeMap<String, NodeResult>;

/// Output of one pipeline run: sampled node results plus flood assessments.
///
/// Immutable once produced; share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub nodes: NodeResults,
    pub flood: BTreeMap<String, FloodAssessment>,
}

impl SimulationResult {
    /// Restricts the result to `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for the first id absent from the result.
    pub fn filter_nodes(&self, ids: &[String]) -> Result<Self> {
        let mut out = Self::default();
        for id in ids {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| PipelineError::NotFound(format!("node \"{id}\"")))?;
            out.nodes.insert(id.clone(), node.clone());
            if let Some(assessment) = self.flood.get(id) {
                out.flood.insert(id.clone(), assessment.clone());
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
