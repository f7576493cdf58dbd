//! Error taxonomy shared by every pipeline stage.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single simulation request.
///
/// Format and structural errors abort a request before the solver is
/// touched; simulation errors carry the solver's own diagnostic text.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A boundary series key or value could not be parsed.
    #[error("format error at `{key}`: {reason}")]
    Format {
        /// Offending timestamp key (or request field).
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The template is missing a section the composer relies on.
    #[error("template is missing required structure: {0}")]
    Structural(String),

    /// The external solver failed.
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// Unknown job or node id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The run exceeded the configured time limit.
    #[error("run timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,

    /// Filesystem access failed.
    #[error("i/o error on `{}`: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The service configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The result cache could not be written.
    #[error("cache error: {0}")]
    Cache(String),
}

impl PipelineError {
    pub(crate) fn format(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::Structural(_))
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_names_the_key() {
        let err = PipelineError::format("01/01/2024 xx:00", "invalid timestamp");
        let msg = err.to_string();
        assert!(msg.contains("01/01/2024 xx:00"));
        assert!(err.is_client_error());
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let err = PipelineError::Timeout(Duration::from_secs(90));
        assert_eq!(err.to_string(), "run timed out after 90s");
        assert!(!err.is_client_error());
    }

    #[test]
    fn config_error_is_not_the_callers_fault() {
        let err = PipelineError::Config("flood.method: unknown".into());
        assert_eq!(err.to_string(), "invalid configuration: flood.method: unknown");
        assert!(!err.is_client_error());
    }
}
