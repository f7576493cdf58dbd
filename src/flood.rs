//! Flood risk classification.
//!
//! Two classifiers are provided and deliberately kept apart: a fullness
//! ratio with fixed per-bucket probabilities, and a depth-above-ground
//! classifier with probabilities interpolated inside each bucket. They use
//! different breakpoints for what looks like the same quantity, so neither
//! is derived from the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::registry::Node;
use crate::sim::types::NodeResult;

/// Ordinal flood risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FloodRisk {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for FloodRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Fallback capacity divisor when neither geometry nor capacity is usable (m).
const LAST_RESORT_CAPACITY: f64 = 25.0;

/// Default bucket width for [`classify_by_absolute_depth`] (m).
pub const DEFAULT_DEPTH_THRESHOLD: f64 = 0.3;

/// Classifies by how full a node got relative to its usable depth.
///
/// The ratio is `max_depth / (ground - invert)` when the node has positive
/// depth; otherwise `max_depth / node_capacity` when capacity is positive;
/// otherwise `min(max_depth / 25, 1)`. It is clamped to `[0, 2]` and
/// bucketed at 0.3, 0.6 and 0.85.
///
/// # Examples
///
/// ```
/// use floodcast::flood::{FloodRisk, classify_by_ratio};
///
/// assert_eq!(classify_by_ratio(0.0, 0.0, 5.0, 10.0).0, FloodRisk::Low);
/// assert_eq!(classify_by_ratio(4.5, 0.0, 5.0, 10.0).0, FloodRisk::Critical);
/// ```
pub fn classify_by_ratio(
    max_depth: f64,
    invert_elevation: f64,
    ground_elevation: f64,
    node_capacity: f64,
) -> (FloodRisk, f64) {
    let ratio = if ground_elevation > invert_elevation {
        max_depth / (ground_elevation - invert_elevation)
    } else if node_capacity > 0.0 {
        max_depth / node_capacity
    } else {
        (max_depth / LAST_RESORT_CAPACITY).min(1.0)
    };
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 2.0) };

    if ratio <= 0.3 {
        (FloodRisk::Low, 0.1)
    } else if ratio <= 0.6 {
        (FloodRisk::Medium, 0.3)
    } else if ratio <= 0.85 {
        (FloodRisk::High, 0.7)
    } else {
        (FloodRisk::Critical, 0.9)
    }
}

/// Classifies by how far the water level rose above ground.
///
/// With `d = max(0, water_level - ground)` and bucket width `threshold`:
/// `d == 0` is NONE; below one width is LOW (probability 0 to 0.3), below
/// two is MEDIUM (0.3 to 0.6), below three is HIGH (0.6 to 0.85), and
/// anything deeper is CRITICAL (0.85 rising to at most 1.0). A
/// non-positive threshold falls back to [`DEFAULT_DEPTH_THRESHOLD`].
pub fn classify_by_absolute_depth(
    water_level: f64,
    ground_elevation: f64,
    threshold: f64,
) -> (FloodRisk, f64) {
    let threshold = if threshold > 0.0 {
        threshold
    } else {
        DEFAULT_DEPTH_THRESHOLD
    };
    let flood_depth = (water_level - ground_elevation).max(0.0);

    if flood_depth <= 0.0 || flood_depth.is_nan() {
        (FloodRisk::None, 0.0)
    } else if flood_depth < threshold {
        (FloodRisk::Low, 0.3 * flood_depth / threshold)
    } else if flood_depth < 2.0 * threshold {
        let t = (flood_depth - threshold) / threshold;
        (FloodRisk::Medium, 0.3 + 0.3 * t)
    } else if flood_depth < 3.0 * threshold {
        let t = (flood_depth - 2.0 * threshold) / threshold;
        (FloodRisk::High, 0.6 + 0.25 * t)
    } else {
        let t = (flood_depth - 3.0 * threshold) / threshold;
        (FloodRisk::Critical, (0.85 + 0.15 * t).min(1.0))
    }
}

/// Which classifier the pipeline applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloodMethod {
    /// [`classify_by_ratio`] with the given default capacity.
    Ratio { default_capacity: f64 },
    /// [`classify_by_absolute_depth`] with the given bucket width.
    AbsoluteDepth { threshold: f64 },
}

impl FloodMethod {
    /// Resolves a `flood.method` name; `None` if unknown.
    pub fn from_name(name: &str, threshold: f64, default_capacity: f64) -> Option<Self> {
        match name {
            "ratio" => Some(Self::Ratio { default_capacity }),
            "absolute_depth" => Some(Self::AbsoluteDepth { threshold }),
            _ => None,
        }
    }
}

impl Default for FloodMethod {
    fn default() -> Self {
        Self::Ratio {
            default_capacity: LAST_RESORT_CAPACITY,
        }
    }
}

/// Risk of one node after a run. Derived, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodAssessment {
    pub node_id: String,
    pub risk: FloodRisk,
    /// In `[0, 1]`.
    pub probability: f64,
}

impl FloodAssessment {
    /// Assesses `result` against the node's registered geometry.
    ///
    /// The ratio classifier uses the node's max depth as its capacity;
    /// the depth classifier compares peak water level to ground.
    pub fn assess(method: FloodMethod, node: &Node, result: &NodeResult) -> Self {
        let (risk, probability) = match method {
            FloodMethod::Ratio { default_capacity } => {
                let capacity = if node.max_depth > 0.0 {
                    node.max_depth
                } else {
                    default_capacity
                };
                classify_by_ratio(
                    result.max_depth_m,
                    node.invert_elevation,
                    node.ground_elevation,
                    capacity,
                )
            }
            FloodMethod::AbsoluteDepth { threshold } => classify_by_absolute_depth(
                result.max_water_level_m,
                node.ground_elevation,
                threshold,
            ),
        };
        Self {
            node_id: node.id.clone(),
            risk,
            probability,
        }
    }
}
