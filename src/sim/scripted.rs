//! Deterministic in-process solver.
//!
//! Reads the simulation window and node tables from a patched document and
//! reports depths from a caller-supplied script. Used by the CLI and tests
//! where the real hydraulic engine is not available.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};

use super::solver::{NodeReading, Solver, SolverError, SolverRun};
use crate::config::{RegistryConfig, SolverConfig};
use crate::model::document::section_rows;
use crate::model::registry::{NodeKind, NodeRegistry, SubstringFallbackPolicy};

/// Depth (m) of node `id` at time `t`.
pub type DepthScript = Arc<dyn Fn(&str, NaiveDateTime) -> f64 + Send + Sync>;

/// Solver whose node depths come from a script instead of hydraulics.
#[derive(Clone)]
pub struct ScriptedSolver {
    step: Duration,
    script: DepthScript,
    step_delay: StdDuration,
    failure: Option<String>,
}

impl fmt::Debug for ScriptedSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedSolver")
            .field("step", &self.step)
            .field("step_delay", &self.step_delay)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl ScriptedSolver {
    /// Creates a solver stepping at `config.step_seconds` and reporting `script` depths.
    pub fn new(config: &SolverConfig, script: DepthScript) -> Self {
        Self {
            step: Duration::seconds(i64::from(config.step_seconds)),
            script,
            step_delay: StdDuration::ZERO,
            failure: None,
        }
    }

    /// Every node stays dry for the whole run.
    pub fn still_water(config: &SolverConfig) -> Self {
        Self::new(config, Arc::new(|_, _| 0.0))
    }

    /// Sleeps this long on every step, emulating a slow engine.
    pub fn with_step_delay(mut self, delay: StdDuration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Rejects every document with `diagnostic`.
    pub fn failing(mut self, diagnostic: impl Into<String>) -> Self {
        self.failure = Some(diagnostic.into());
        self
    }
}

impl Solver for ScriptedSolver {
    type Run = ScriptedRun;

    fn open(&self, input: &Path) -> Result<ScriptedRun, SolverError> {
        if let Some(diagnostic) = &self.failure {
            return Err(SolverError(diagnostic.clone()));
        }
        let text = fs::read_to_string(input)
            .map_err(|e| SolverError(format!("cannot open {}: {e}", input.display())))?;

        let start = option_time(&text, "START_DATE", "START_TIME")?;
        let end = option_time(&text, "END_DATE", "END_TIME")?;
        if end <= start {
            return Err(SolverError("END_DATE precedes START_DATE".to_string()));
        }

        let registry = NodeRegistry::parse(
            &text,
            &RegistryConfig::default(),
            &SubstringFallbackPolicy::default(),
        )
        .map_err(|e| SolverError(e.to_string()))?;
        let nodes = registry
            .iter()
            .map(|n| (n.id.clone(), n.kind, n.invert_elevation))
            .collect();

        Ok(ScriptedRun {
            start,
            end,
            now: start,
            step: self.step,
            step_delay: self.step_delay,
            script: Arc::clone(&self.script),
            nodes,
        })
    }
}

/// One scripted run.
pub struct ScriptedRun {
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
    step: Duration,
    step_delay: StdDuration,
    script: DepthScript,
    nodes: Vec<(String, NodeKind, f64)>,
}

impl SolverRun for ScriptedRun {
    fn start_time(&self) -> NaiveDateTime {
        self.start
    }

    fn end_time(&self) -> NaiveDateTime {
        self.end
    }

    fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|(id, _, _)| id.clone()).collect()
    }

    fn step(&mut self) -> Result<Option<NaiveDateTime>, SolverError> {
        if self.now >= self.end {
            return Ok(None);
        }
        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }
        self.now = (self.now + self.step).min(self.end);
        Ok(Some(self.now))
    }

    fn read_node(&self, id: &str) -> Option<NodeReading> {
        let (_, kind, invert) = self.nodes.iter().find(|(n, _, _)| n == id)?;
        let depth = (self.script)(id, self.now).max(0.0);
        // Outfalls report neither inflow nor head.
        let reported = *kind != NodeKind::Outfall;
        Some(NodeReading {
            depth,
            inflow: reported.then_some(0.0),
            head: reported.then_some(invert + depth),
            invert_elevation: *invert,
        })
    }
}

/// Reads `DATE_KEY` and `TIME_KEY` from `[OPTIONS]`.
fn option_time(text: &str, date_key: &str, time_key: &str) -> Result<NaiveDateTime, SolverError> {
    let rows = section_rows(text, "OPTIONS")
        .ok_or_else(|| SolverError("ERROR: [OPTIONS] section missing".to_string()))?;
    let value = |key: &str| {
        rows.iter()
            .find(|row| row.first().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            .and_then(|row| row.get(1).copied())
    };
    let date = value(date_key).ok_or_else(|| SolverError(format!("ERROR: {date_key} missing")))?;
    let time = value(time_key).unwrap_or("00:00:00");
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%m/%d/%Y %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%m/%d/%Y %H:%M"))
        .map_err(|_| SolverError(format!("ERROR: invalid {date_key} {date} {time}")))
}
