//! CSV export for sampled node series.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::series::timefmt::format_timestamp;
use crate::sim::types::SimulationResult;

/// Column header for node series export.
const HEADER: &str = "node,time,depth,inflow,water_level,invert_elevation";

/// Exports every node's sampled series to a CSV file at the given path.
///
/// Rows are sorted by node id, then time. Produces deterministic output for
/// identical inputs.
///
/// # Arguments
///
/// * `result` - Simulation result to export
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(result: &SimulationResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(result, buf)
}

/// Writes node series as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(result: &SimulationResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(','))?;

    // `nodes` is a BTreeMap and each series is already time-ordered.
    for (id, node) in &result.nodes {
        for s in &node.time_series {
            wtr.write_record(&[
                id.clone(),
                format_timestamp(&s.time),
                format!("{:.4}", s.depth),
                format!("{:.4}", s.inflow),
                format!("{:.4}", s.water_level),
                format!("{:.4}", s.invert_elevation),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
