//! TOML-based service configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::model::registry::NodeKind;

/// Top-level service configuration parsed from TOML.
///
/// All fields have defaults, so an empty document is a valid configuration.
/// Load from TOML with [`ServiceConfig::from_toml_file`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Boundary series names and upstream nodes.
    #[serde(default)]
    pub boundary: BoundaryConfig,
    /// Node registry parsing.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Result sampling cadence.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Flood classification.
    #[serde(default)]
    pub flood: FloodConfig,
    /// Job execution limits.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Result cache.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Bundled scripted solver.
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Template model document.
    pub template: PathBuf,
    /// Parent of the per-run working directories.
    pub work_dir: PathBuf,
    /// Result cache directory.
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("model.inp"),
            work_dir: PathBuf::from("work"),
            cache_dir: PathBuf::from("cache"),
        }
    }
}

/// Names under which boundary series are injected and the nodes they feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    pub rain_series: String,
    pub inflow_a_series: String,
    pub inflow_b_series: String,
    pub tide_series: String,
    /// Node receiving the first inflow series.
    pub inflow_a_node: String,
    /// Node receiving the second inflow series.
    pub inflow_b_node: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            rain_series: "TSN".to_string(),
            inflow_a_series: "Inflow_DauTieng".to_string(),
            inflow_b_series: "Inflow_TriAn".to_string(),
            tide_series: "VT".to_string(),
            inflow_a_node: "0SG".to_string(),
            inflow_b_node: "0DN".to_string(),
        }
    }
}

/// One substring rule of the fallback heuristic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackRule {
    /// Substring matched against the node id.
    pub pattern: String,
    /// Kind assigned to matching nodes.
    pub kind: NodeKind,
    /// Invert elevation substituted on parse failure (m).
    pub invert_elevation: f64,
    /// Max depth substituted on parse failure (m).
    pub max_depth: f64,
}

/// Node registry parsing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Fail when the coordinate, junction or storage table is missing.
    pub strict: bool,
    /// Longitude given to nodes without coordinates.
    pub default_x: f64,
    /// Latitude given to nodes without coordinates.
    pub default_y: f64,
    /// Substring rules, first match wins.
    pub fallback: Vec<FallbackRule>,
    /// Invert elevation when no rule matches (m).
    pub default_invert_elevation: f64,
    /// Max depth when no rule matches (m).
    pub default_max_depth: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict: false,
            default_x: 106.7009,
            default_y: 10.7769,
            fallback: vec![
                FallbackRule {
                    pattern: "SG".to_string(),
                    kind: NodeKind::Storage,
                    invert_elevation: 0.0,
                    max_depth: 3.0,
                },
                FallbackRule {
                    pattern: "DN".to_string(),
                    kind: NodeKind::Junction,
                    invert_elevation: 0.0,
                    max_depth: 2.0,
                },
                FallbackRule {
                    pattern: "OUT".to_string(),
                    kind: NodeKind::Outfall,
                    invert_elevation: 0.0,
                    max_depth: 0.0,
                },
            ],
            default_invert_elevation: 0.0,
            default_max_depth: 2.5,
        }
    }
}

/// Result sampling cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Capture a step when its minute is a multiple of this value.
    pub capture_every_minutes: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            capture_every_minutes: 15,
        }
    }
}

/// Flood classification.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FloodConfig {
    /// Classifier: `"ratio"` or `"absolute_depth"`.
    pub method: String,
    /// Depth-above-ground bucket width for `"absolute_depth"` (m).
    pub threshold: f64,
    /// Capacity used when a node has no usable geometry (m).
    pub default_capacity: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            method: "ratio".to_string(),
            threshold: 0.3,
            default_capacity: 25.0,
        }
    }
}

/// Job execution limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    /// Per-run wall-clock limit in seconds (0 disables).
    pub timeout_secs: u64,
    /// Attempts made to remove a working directory.
    pub cleanup_retries: u32,
    /// Delay before the second cleanup attempt; doubles afterwards (ms).
    pub cleanup_backoff_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            cleanup_retries: 3,
            cleanup_backoff_ms: 500,
        }
    }
}

impl JobsConfig {
    /// The run timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Result cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Bundled scripted solver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Routing step in seconds.
    pub step_seconds: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { step_seconds: 300 }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"jobs.cleanup_retries"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ServiceConfig {
    /// Flood methods accepted by `flood.method`.
    pub const FLOOD_METHODS: &[&str] = &["ratio", "absolute_depth"];

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let b = &self.boundary;
        for (field, value) in [
            ("boundary.rain_series", &b.rain_series),
            ("boundary.inflow_a_series", &b.inflow_a_series),
            ("boundary.inflow_b_series", &b.inflow_b_series),
            ("boundary.tide_series", &b.tide_series),
            ("boundary.inflow_a_node", &b.inflow_a_node),
            ("boundary.inflow_b_node", &b.inflow_b_node),
        ] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                errors.push(ConfigError {
                    field: field.into(),
                    message: "must be a single non-empty token".into(),
                });
            }
        }
        let names = [
            &b.rain_series,
            &b.inflow_a_series,
            &b.inflow_b_series,
            &b.tide_series,
        ];
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                errors.push(ConfigError {
                    field: "boundary".into(),
                    message: format!("series name \"{name}\" is used twice"),
                });
            }
        }

        let r = &self.registry;
        for (i, rule) in r.fallback.iter().enumerate() {
            if rule.pattern.is_empty() {
                errors.push(ConfigError {
                    field: format!("registry.fallback[{i}].pattern"),
                    message: "must not be empty".into(),
                });
            }
            if rule.max_depth < 0.0 {
                errors.push(ConfigError {
                    field: format!("registry.fallback[{i}].max_depth"),
                    message: "must be >= 0".into(),
                });
            }
        }
        if r.default_max_depth < 0.0 {
            errors.push(ConfigError {
                field: "registry.default_max_depth".into(),
                message: "must be >= 0".into(),
            });
        }

        let cadence = self.sampling.capture_every_minutes;
        if cadence == 0 || 60 % cadence != 0 {
            errors.push(ConfigError {
                field: "sampling.capture_every_minutes".into(),
                message: format!("must divide 60, got {cadence}"),
            });
        }

        let f = &self.flood;
        if !Self::FLOOD_METHODS.contains(&f.method.as_str()) {
            errors.push(ConfigError {
                field: "flood.method".into(),
                message: format!(
                    "must be one of {}, got \"{}\"",
                    Self::FLOOD_METHODS.join(", "),
                    f.method
                ),
            });
        }
        if f.threshold <= 0.0 {
            errors.push(ConfigError {
                field: "flood.threshold".into(),
                message: "must be > 0".into(),
            });
        }
        if f.default_capacity < 0.0 {
            errors.push(ConfigError {
                field: "flood.default_capacity".into(),
                message: "must be >= 0".into(),
            });
        }

        if self.jobs.cleanup_retries == 0 {
            errors.push(ConfigError {
                field: "jobs.cleanup_retries".into(),
                message: "must be > 0".into(),
            });
        }

        if self.solver.step_seconds == 0 {
            errors.push(ConfigError {
                field: "solver.step_seconds".into(),
                message: "must be > 0".into(),
            });
        }

        errors
    }
}
