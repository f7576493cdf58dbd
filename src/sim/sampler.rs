//! Reduces a dense solver trace to roughly hourly per-node series.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};

use super::solver::NodeReading;
use super::types::{NodeResult, NodeResults, NodeSample};

/// Captures node readings at a fixed minute cadence, keeping the first
/// capture of each clock hour per node.
#[derive(Debug)]
pub struct ResultSampler {
    capture_every_minutes: u32,
    series: BTreeMap<String, Vec<NodeSample>>,
}

impl ResultSampler {
    /// # Panics
    ///
    /// Panics if `capture_every_minutes` is zero.
    pub fn new(capture_every_minutes: u32) -> Self {
        assert!(capture_every_minutes > 0, "capture cadence must be > 0");
        Self {
            capture_every_minutes,
            series: BTreeMap::new(),
        }
    }

    /// Whether a step ending at `t` falls on the capture cadence.
    pub fn qualifies(&self, t: NaiveDateTime) -> bool {
        t.minute() % self.capture_every_minutes == 0
    }

    /// Records `reading` for `node` at `t` unless the hour already has a sample.
    ///
    /// Missing inflow becomes 0; missing head becomes `invert + depth`.
    pub fn capture(&mut self, node: &str, t: NaiveDateTime, reading: &NodeReading) {
        if !self.qualifies(t) {
            return;
        }
        let samples = self.series.entry(node.to_string()).or_default();
        let bucket = hour_bucket(t);
        if samples.last().is_some_and(|s| hour_bucket(s.time) == bucket) {
            return;
        }
        samples.push(NodeSample {
            time: t,
            depth: reading.depth,
            inflow: reading.inflow.unwrap_or(0.0),
            water_level: reading
                .head
                .unwrap_or(reading.invert_elevation + reading.depth),
            invert_elevation: reading.invert_elevation,
        });
    }

    /// Finishes sampling. Nodes with no captures are omitted.
    pub fn finish(self) -> NodeResults {
        self.series
            .into_iter()
            .filter_map(|(node, samples)| {
                NodeResult::from_samples(&node, samples).map(|result| (node, result))
            })
            .collect()
    }
}

fn hour_bucket(t: NaiveDateTime) -> NaiveDateTime {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
