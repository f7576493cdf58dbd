//! Node registry parsed from the template's node and coordinate tables.
//!
//! Parsing is tolerant: a row whose numeric fields cannot be read is still
//! registered, with elevations taken from a [`FallbackPolicy`] and the
//! substitution recorded as a [`ParseFallback`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::document::section_rows;
use crate::config::{FallbackRule, RegistryConfig};
use crate::error::{PipelineError, Result};

/// Hydraulic role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Junction,
    Storage,
    Outfall,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Junction => "junction",
            Self::Storage => "storage",
            Self::Outfall => "outfall",
        };
        f.write_str(s)
    }
}

/// Static metadata of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    /// Elevation of the node's lowest interior point (m).
    pub invert_elevation: f64,
    /// Depth from invert to ground (m), never negative.
    pub max_depth: f64,
    /// `invert_elevation + max_depth`.
    pub ground_elevation: f64,
    pub initial_depth: f64,
    pub surface_depth: f64,
    pub ponded_area: f64,
}

impl Node {
    fn new(id: &str, kind: NodeKind, invert_elevation: f64, max_depth: f64) -> Self {
        let max_depth = max_depth.max(0.0);
        Self {
            id: id.to_string(),
            kind,
            x: 0.0,
            y: 0.0,
            invert_elevation,
            max_depth,
            ground_elevation: invert_elevation + max_depth,
            initial_depth: 0.0,
            surface_depth: 0.0,
            ponded_area: 0.0,
        }
    }

    /// Builds a node entirely from a fallback profile.
    pub fn from_profile(id: &str, profile: &FallbackProfile) -> Self {
        Self::new(
            id,
            profile.kind,
            profile.invert_elevation,
            profile.max_depth,
        )
    }
}

/// Values substituted for a node whose row could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackProfile {
    pub kind: NodeKind,
    pub invert_elevation: f64,
    pub max_depth: f64,
}

/// Heuristic supplying defaults for unparsable or unknown nodes.
///
/// This is an approximation keyed on node ids, not a physical rule. Swap it
/// out when the model carries an explicit type field.
pub trait FallbackPolicy: Send + Sync + fmt::Debug {
    /// Name recorded on every [`ParseFallback`] this policy produces.
    fn name(&self) -> &str;

    /// Profile for node `id`.
    fn fallback_for(&self, id: &str) -> FallbackProfile;

    /// Kind of a node the solver reports but the registry lacks.
    fn infer_kind(&self, id: &str) -> NodeKind {
        self.fallback_for(id).kind
    }
}

/// Default policy: the first rule whose pattern occurs in the id wins.
#[derive(Debug, Clone)]
pub struct SubstringFallbackPolicy {
    rules: Vec<FallbackRule>,
    default: FallbackProfile,
}

impl SubstringFallbackPolicy {
    pub fn new(rules: Vec<FallbackRule>, default: FallbackProfile) -> Self {
        Self { rules, default }
    }

    /// Builds the policy from `[registry]` settings.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            config.fallback.clone(),
            FallbackProfile {
                kind: NodeKind::Junction,
                invert_elevation: config.default_invert_elevation,
                max_depth: config.default_max_depth,
            },
        )
    }
}

impl Default for SubstringFallbackPolicy {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default())
    }
}

impl FallbackPolicy for SubstringFallbackPolicy {
    fn name(&self) -> &str {
        "id-substring"
    }

    fn fallback_for(&self, id: &str) -> FallbackProfile {
        self.rules
            .iter()
            .find(|rule| id.contains(&rule.pattern))
            .map_or(self.default, |rule| FallbackProfile {
                kind: rule.kind,
                invert_elevation: rule.invert_elevation,
                max_depth: rule.max_depth,
            })
    }
}

/// A default substituted for one unparsable row. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseFallback {
    pub node_id: String,
    pub section: &'static str,
    pub reason: String,
    pub policy: String,
}

/// All nodes declared by a template, keyed by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Node>,
    #[serde(skip)]
    fallbacks: Vec<ParseFallback>,
}

impl NodeRegistry {
    /// Parses `[JUNCTIONS]`, `[STORAGE]`, `[OUTFALLS]` and `[COORDINATES]`.
    ///
    /// Coordinates are merged by id; nodes without one get the configured
    /// default. Duplicate ids keep their first declaration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Structural`] only when `config.strict` is set
    /// and the coordinate, junction or storage table is missing entirely.
    pub fn parse(text: &str, config: &RegistryConfig, policy: &dyn FallbackPolicy) -> Result<Self> {
        let mut registry = Self::default();

        for section in ["COORDINATES", "JUNCTIONS", "STORAGE"] {
            if section_rows(text, section).is_none() {
                if config.strict {
                    return Err(PipelineError::Structural(format!(
                        "section [{section}] not found (node registry requires it)"
                    )));
                }
                warn!(section, "node table missing, continuing without it");
            }
        }

        for row in section_rows(text, "JUNCTIONS").unwrap_or_default() {
            registry.add_row(&row, NodeKind::Junction, policy);
        }
        for row in section_rows(text, "STORAGE").unwrap_or_default() {
            registry.add_row(&row, NodeKind::Storage, policy);
        }
        for row in section_rows(text, "OUTFALLS").unwrap_or_default() {
            registry.add_row(&row, NodeKind::Outfall, policy);
        }

        let coordinates = parse_coordinates(text);
        for node in registry.nodes.values_mut() {
            let (x, y) = coordinates
                .get(node.id.as_str())
                .copied()
                .unwrap_or((config.default_x, config.default_y));
            node.x = x;
            node.y = y;
        }

        info!(
            nodes = registry.nodes.len(),
            fallbacks = registry.fallbacks.len(),
            "parsed node registry"
        );
        Ok(registry)
    }

    fn add_row(&mut self, row: &[&str], kind: NodeKind, policy: &dyn FallbackPolicy) {
        let Some(&id) = row.first() else {
            return;
        };
        if self.nodes.contains_key(id) {
            warn!(node = id, section = section_of(kind), "duplicate node id ignored");
            return;
        }
        let node = match parse_node(row, kind) {
            Ok(node) => node,
            Err(reason) => {
                let profile = policy.fallback_for(id);
                let max_depth = match kind {
                    NodeKind::Outfall => 0.0,
                    _ => profile.max_depth,
                };
                let node = Node::new(id, kind, profile.invert_elevation, max_depth);
                warn!(
                    node = id,
                    section = section_of(kind),
                    policy = policy.name(),
                    %reason,
                    "row unparsable, using fallback profile"
                );
                self.fallbacks.push(ParseFallback {
                    node_id: id.to_string(),
                    section: section_of(kind),
                    reason,
                    policy: policy.name().to_string(),
                });
                node
            }
        };
        self.nodes.insert(id.to_string(), node);
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Substitutions made while parsing.
    pub fn fallbacks(&self) -> &[ParseFallback] {
        &self.fallbacks
    }
}

fn section_of(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Junction => "JUNCTIONS",
        NodeKind::Storage => "STORAGE",
        NodeKind::Outfall => "OUTFALLS",
    }
}

/// Positional parse of one node row.
///
/// Junctions: `id elev max_depth [init_depth [sur_depth [ponded_area]]]`.
/// Storage: `id elev max_depth [init_depth ...]`. Outfalls: `id elev ...`.
fn parse_node(row: &[&str], kind: NodeKind) -> std::result::Result<Node, String> {
    let id = row[0];
    let field = |i: usize, name: &str, required: bool| -> std::result::Result<f64, String> {
        match row.get(i) {
            None if required => Err(format!("missing {name}")),
            None => Ok(0.0),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("{name} \"{raw}\" is not a number")),
        }
    };

    let invert = field(1, "elevation", true)?;
    if kind == NodeKind::Outfall {
        return Ok(Node::new(id, kind, invert, 0.0));
    }

    let max_depth = field(2, "max depth", true)?;
    if max_depth < 0.0 {
        return Err(format!("max depth {max_depth} is negative"));
    }
    let mut node = Node::new(id, kind, invert, max_depth);
    node.initial_depth = field(3, "initial depth", false)?;
    if kind == NodeKind::Junction {
        node.surface_depth = field(4, "surcharge depth", false)?;
        node.ponded_area = field(5, "ponded area", false)?;
    }
    Ok(node)
}

/// `id -> (x, y)`; rows that fail to parse are skipped.
fn parse_coordinates(text: &str) -> BTreeMap<&str, (f64, f64)> {
    let mut coordinates = BTreeMap::new();
    for row in section_rows(text, "COORDINATES").unwrap_or_default() {
        let [id, x, y, ..] = row.as_slice() else {
            continue;
        };
        match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(x), Ok(y)) => {
                coordinates.entry(*id).or_insert((x, y));
            }
            _ => warn!(node = *id, "coordinate row unparsable, skipped"),
        }
    }
    coordinates
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
[JUNCTIONS]
;;Name  Elev  MaxDepth InitDepth SurDepth Aponded
0DN     1.0   4.0      0.5       0.2      10
J1      0.5   3.0
J_BAD   abc   3.0      0

[STORAGE]
0SG     2.0   6.0      1.0       FUNCTIONAL 1000 0 0
SG_BAD  --    --

[OUTFALLS]
OUT1    -1.5  FREE

[COORDINATES]
;;Node  X          Y
0DN     106.70     10.80
J1      106.71     10.81
0SG     oops       10.82
";

    fn parse(text: &str, config: &RegistryConfig) -> Result<NodeRegistry> {
        NodeRegistry::parse(text, config, &SubstringFallbackPolicy::from_config(config))
    }

    #[test]
    fn parses_all_node_tables() {
        let reg = parse(TEMPLATE, &RegistryConfig::default()).expect("parse");
        assert_eq!(reg.len(), 6);

        let dn = reg.get("0DN").expect("0DN");
        assert_eq!(dn.kind, NodeKind::Junction);
        assert_eq!(dn.invert_elevation, 1.0);
        assert_eq!(dn.max_depth, 4.0);
        assert_eq!(dn.ground_elevation, 5.0);
        assert_eq!(dn.initial_depth, 0.5);
        assert_eq!(dn.surface_depth, 0.2);
        assert_eq!(dn.ponded_area, 10.0);
        assert_eq!((dn.x, dn.y), (106.70, 10.80));

        let sg = reg.get("0SG").expect("0SG");
        assert_eq!(sg.kind, NodeKind::Storage);
        assert_eq!(sg.ground_elevation, 8.0);

        let out = reg.get("OUT1").expect("OUT1");
        assert_eq!(out.kind, NodeKind::Outfall);
        assert_eq!(out.max_depth, 0.0);
        assert_eq!(out.ground_elevation, -1.5);
    }

    #[test]
    fn unparsable_rows_use_fallback_profiles() {
        let reg = parse(TEMPLATE, &RegistryConfig::default()).expect("parse");

        let bad = reg.get("J_BAD").expect("still registered");
        assert_eq!(bad.kind, NodeKind::Junction);
        assert_eq!(bad.max_depth, 2.5);

        let sg_bad = reg.get("SG_BAD").expect("still registered");
        assert_eq!(sg_bad.kind, NodeKind::Storage);
        assert_eq!(sg_bad.max_depth, 3.0);

        let ids: Vec<&str> = reg.fallbacks().iter().map(|f| f.node_id.as_str()).collect();
        assert_eq!(ids, vec!["J_BAD", "SG_BAD"]);
        assert!(reg.fallbacks().iter().all(|f| f.policy == "id-substring"));
    }

    #[test]
    fn missing_coordinates_get_the_default() {
        let reg = parse(TEMPLATE, &RegistryConfig::default()).expect("parse");
        let sg = reg.get("0SG").expect("0SG");
        assert_eq!((sg.x, sg.y), (106.7009, 10.7769));
        let out = reg.get("OUT1").expect("OUT1");
        assert_eq!((out.x, out.y), (106.7009, 10.7769));
    }

    #[test]
    fn ground_never_below_invert() {
        let text = "[JUNCTIONS]\nNEG 3.0 -1.0\n[STORAGE]\n[COORDINATES]\n";
        let reg = parse(text, &RegistryConfig::default()).expect("parse");
        let node = reg.get("NEG").expect("registered");
        assert!(node.ground_elevation >= node.invert_elevation);
        assert_eq!(reg.fallbacks().len(), 1);
    }

    #[test]
    fn strict_mode_requires_node_tables() {
        let config = RegistryConfig {
            strict: true,
            ..RegistryConfig::default()
        };
        let err = parse("[JUNCTIONS]\nJ1 0 1\n[COORDINATES]\n", &config).expect_err("must fail");
        assert!(err.to_string().contains("[STORAGE]"));

        let lenient = parse("[JUNCTIONS]\nJ1 0 1\n", &RegistryConfig::default()).expect("parse");
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn policy_infers_kind_from_id() {
        let policy = SubstringFallbackPolicy::default();
        assert_eq!(policy.infer_kind("0SG"), NodeKind::Storage);
        assert_eq!(policy.infer_kind("OUT_2"), NodeKind::Outfall);
        assert_eq!(policy.infer_kind("0DN"), NodeKind::Junction);
        assert_eq!(policy.infer_kind("J42"), NodeKind::Junction);
        assert_eq!(policy.fallback_for("0DN").max_depth, 2.0);
        assert_eq!(policy.fallback_for("J42").max_depth, 2.5);
    }
}
