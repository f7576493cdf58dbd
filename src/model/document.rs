//! Bracket-sectioned model documents.
//!
//! A document is plain text split into `[NAME]` sections. Lines starting
//! with `;` are comments. Section names compare case-insensitively.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{PipelineError, Result};

/// Returns the upper-cased section name if `line` is a section header.
pub fn section_header(line: &str) -> Option<String> {
    let trimmed = line.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(|name| name.trim().to_ascii_uppercase())
}

/// Returns `true` for blank lines and `;` comments.
pub fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with(';')
}

/// Body lines of the first section called `name`, or `None` when absent.
pub fn section_lines<'a>(text: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let wanted = name.to_ascii_uppercase();
    let mut lines = text.lines();
    lines.by_ref().find(|line| section_header(line).as_deref() == Some(wanted.as_str()))?;
    Some(lines.take_while(|line| section_header(line).is_none()).collect())
}

/// Whitespace-split tokens of each data row in section `name`.
///
/// Comment and blank lines are skipped. Returns `None` when the section is absent.
pub fn section_rows<'a>(text: &'a str, name: &str) -> Option<Vec<Vec<&'a str>>> {
    section_lines(text, name).map(|lines| {
        lines
            .into_iter()
            .filter(|line| !is_comment_or_blank(line))
            .map(|line| line.split_whitespace().collect())
            .collect()
    })
}

/// Returns `true` when the document contains a section called `name`.
pub fn has_section(text: &str, name: &str) -> bool {
    let wanted = name.to_ascii_uppercase();
    text.lines()
        .any(|line| section_header(line).as_deref() == Some(wanted.as_str()))
}

/// Immutable base model document, loaded once per process.
///
/// The version is a content hash, so two templates with identical text
/// share a version.
#[derive(Debug, Clone)]
pub struct ModelTemplate {
    text: Arc<str>,
    version: u64,
}

impl ModelTemplate {
    /// Wraps template text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let version = xxh3_64(text.as_bytes());
        Self {
            text: text.into(),
            version,
        }
    }

    /// Reads a template from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let template = Self::from_text(text);
        info!(
            path = %path.display(),
            version = %template.version_hex(),
            sections = template.section_names().len(),
            "loaded model template"
        );
        Ok(template)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version rendered as 16 hex digits.
    pub fn version_hex(&self) -> String {
        format!("{:016x}", self.version)
    }

    /// Names of all sections in document order.
    pub fn section_names(&self) -> Vec<String> {
        self.text.lines().filter_map(section_header).collect()
    }
}
