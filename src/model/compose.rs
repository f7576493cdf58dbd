//! Injects resampled boundary series into a template document.
//!
//! Composition strips any previously injected `[INFLOWS]` and `[TIMESERIES]`
//! sections, pins the `[OPTIONS]` simulation window, and appends freshly
//! rendered sections at the end of the document. Composing an already
//! composed document with the same inputs reproduces it byte for byte.

use tracing::{debug, warn};

use super::document::{has_section, is_comment_or_blank, section_header, section_rows};
use crate::config::BoundaryConfig;
use crate::error::{PipelineError, Result};
use crate::series::timefmt::{DATE_FORMAT, TIME_FORMAT, format_timestamp};
use crate::series::{Boundaries, SimulationWindow, TimeSeries};

/// Sections owned by the composer; removed before every injection.
const INJECTED_SECTIONS: [&str; 2] = ["INFLOWS", "TIMESERIES"];

/// Sections the template must provide.
const REQUIRED_SECTIONS: [(&str, &str); 2] = [
    ("OPTIONS", "the simulation window is written into [OPTIONS]"),
    ("JUNCTIONS", "boundary inflows attach to nodes declared in [JUNCTIONS]"),
];

const NODE_SECTIONS: [&str; 3] = ["JUNCTIONS", "STORAGE", "OUTFALLS"];

/// Composes patched model documents from a template and boundary series.
#[derive(Debug, Clone)]
pub struct ModelComposer {
    binding: BoundaryConfig,
}

impl ModelComposer {
    /// Creates a composer binding series and upstream nodes as configured.
    pub fn new(binding: BoundaryConfig) -> Self {
        Self { binding }
    }

    /// Produces a patched document.
    ///
    /// # Arguments
    ///
    /// * `template` - Template (or previously composed) document text
    /// * `series` - Resampled boundary series
    /// * `window` - Simulation start/end written into `[OPTIONS]`
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Structural`] if `[OPTIONS]` or `[JUNCTIONS]`
    /// is absent from the template.
    pub fn compose(
        &self,
        template: &str,
        series: &Boundaries<TimeSeries>,
        window: &SimulationWindow,
    ) -> Result<String> {
        for (section, assumption) in REQUIRED_SECTIONS {
            if !has_section(template, section) {
                return Err(PipelineError::Structural(format!(
                    "section [{section}] not found ({assumption})"
                )));
            }
        }
        self.check_upstream_nodes(template);

        let mut doc = strip_and_patch(template, window).join("\n");
        let trimmed = doc.trim_end().len();
        doc.truncate(trimmed);

        doc.push_str("\n\n");
        doc.push_str(&self.render_inflows());
        doc.push('\n');
        doc.push_str(&self.render_timeseries(series));

        debug!(bytes = doc.len(), "composed model document");
        Ok(doc)
    }

    fn check_upstream_nodes(&self, template: &str) {
        for node in [&self.binding.inflow_a_node, &self.binding.inflow_b_node] {
            let declared = NODE_SECTIONS.iter().any(|section| {
                section_rows(template, section)
                    .is_some_and(|rows| rows.iter().any(|row| row.first() == Some(&node.as_str())))
            });
            if !declared {
                warn!(node = %node, "upstream inflow node is not declared in the template");
            }
        }
    }

    fn render_inflows(&self) -> String {
        let b = &self.binding;
        let mut out = String::from("[INFLOWS]\n");
        out.push_str(";;Node           Constituent      Time Series      Type     Mfactor  Sfactor\n");
        for (node, series) in [
            (&b.inflow_a_node, &b.inflow_a_series),
            (&b.inflow_b_node, &b.inflow_b_series),
        ] {
            out.push_str(&format!(
                "{node:<16} {:<16} {series:<16} {:<8} {:<8} {}\n",
                "FLOW", "FLOW", "1.0", "1.0"
            ));
        }
        out
    }

    fn render_timeseries(&self, series: &Boundaries<TimeSeries>) -> String {
        let b = &self.binding;
        let mut out = String::from("[TIMESERIES]\n");
        out.push_str(";;Name           Date       Time       Value\n");
        for (name, ts) in [
            (&b.rain_series, &series.rain),
            (&b.inflow_a_series, &series.inflow_a),
            (&b.inflow_b_series, &series.inflow_b),
            (&b.tide_series, &series.tide),
        ] {
            for (t, v) in ts {
                out.push_str(&format!("{name} {} {v}\n", format_timestamp(t)));
            }
        }
        out
    }
}

/// `[OPTIONS]` keys pinned to the simulation window, in insertion order.
fn window_options(window: &SimulationWindow) -> [(&'static str, String); 6] {
    let date = |t: &chrono::NaiveDateTime| t.format(DATE_FORMAT).to_string();
    let time = |t: &chrono::NaiveDateTime| t.format(TIME_FORMAT).to_string();
    [
        ("START_DATE", date(&window.start)),
        ("START_TIME", time(&window.start)),
        ("REPORT_START_DATE", date(&window.start)),
        ("REPORT_START_TIME", time(&window.start)),
        ("END_DATE", date(&window.end)),
        ("END_TIME", time(&window.end)),
    ]
}

/// Drops injected sections and rewrites the `[OPTIONS]` window keys.
fn strip_and_patch(template: &str, window: &SimulationWindow) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut options_body: Vec<String> = Vec::new();

    for line in template.lines() {
        if let Some(name) = section_header(line) {
            if current.as_deref() == Some("OPTIONS") {
                out.extend(patch_options(std::mem::take(&mut options_body), window));
            }
            let skip = INJECTED_SECTIONS.contains(&name.as_str());
            current = Some(name);
            if !skip {
                out.push(line.to_string());
            }
            continue;
        }
        match current.as_deref() {
            Some(name) if INJECTED_SECTIONS.contains(&name) => {}
            Some("OPTIONS") => options_body.push(line.to_string()),
            _ => out.push(line.to_string()),
        }
    }
    if current.as_deref() == Some("OPTIONS") {
        out.extend(patch_options(options_body, window));
    }
    out
}

fn patch_options(mut body: Vec<String>, window: &SimulationWindow) -> Vec<String> {
    let pinned = window_options(window);
    let mut seen = [false; 6];

    for line in body.iter_mut() {
        if is_comment_or_blank(line) {
            continue;
        }
        let key = line
            .split_whitespace()
            .next()
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        if let Some(i) = pinned.iter().position(|(k, _)| *k == key) {
            *line = format!("{:<21}{}", pinned[i].0, pinned[i].1);
            seen[i] = true;
        }
    }

    let insert_at = body
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    let missing: Vec<String> = pinned
        .iter()
        .zip(seen)
        .filter(|(_, seen)| !seen)
        .map(|((k, v), _)| format!("{k:<21}{v}"))
        .collect();
    body.splice(insert_at..insert_at, missing);
    body
}
