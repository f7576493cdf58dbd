//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use floodcast::config::{ServiceConfig, SolverConfig};
use floodcast::jobs::JobManager;
use floodcast::model::ModelTemplate;
use floodcast::pipeline::{Pipeline, SimulationRequest};
use floodcast::series::{Boundaries, RawSeries, RawValue};
use floodcast::sim::ScriptedSolver;

/// Template with three junctions (one downstream `0DN`) and one storage `0SG`.
pub const TEMPLATE: &str = "\
[TITLE]
;;Project Title/Notes
Test catchment

[OPTIONS]
;;Option             Value
FLOW_UNITS           CMS
INFILTRATION         HORTON
FLOW_ROUTING         DYNWAVE
START_DATE           01/01/2020
START_TIME           00:00:00
REPORT_START_DATE    01/01/2020
REPORT_START_TIME    00:00:00
END_DATE             01/02/2020
END_TIME             00:00:00
REPORT_STEP          00:15:00

[JUNCTIONS]
;;Name           Elevation  MaxDepth   InitDepth  SurDepth   Aponded
0DN              0.5        2.0        0          0          0
J1               1.0        1.5        0          0          0
J2               1.2        1.5        0          0          0

[STORAGE]
;;Name           Elev.    MaxDepth   InitDepth  Shape      Curve
0SG              0.0      3.0        0          FUNCTIONAL 1000 0 0

[CONDUITS]
;;Name           From Node        To Node          Length     Roughness
C1               J1               J2               120        0.013
C2               J2               0DN              200        0.013

[INFLOWS]
;;Node           Constituent      Time Series      Type     Mfactor  Sfactor
J1               FLOW             OLD_SERIES       FLOW     1.0      1.0

[TIMESERIES]
;;Name           Date       Time       Value
OLD_SERIES       01/01/2020 00:00      1.0

[COORDINATES]
;;Node           X-Coord            Y-Coord
0DN              106.70             10.77
J1               106.71             10.78
J2               106.72             10.79
0SG              106.69             10.76
";

pub const START: &str = "09/01/2024 00:00";
pub const END: &str = "09/02/2024 00:00";

/// A 24-hour series sampled every 6 hours.
pub fn six_hourly(values: [f64; 5]) -> RawSeries {
    let stamps = [
        "09/01/2024 00:00",
        "09/01/2024 06:00",
        "09/01/2024 12:00",
        "09/01/2024 18:00",
        "09/02/2024 00:00",
    ];
    stamps
        .iter()
        .zip(values)
        .map(|(t, v)| (t.to_string(), RawValue::Number(v)))
        .collect()
}

/// Four boundary series over [`START`, `END`] at 6-hour granularity.
pub fn boundaries() -> Boundaries<RawSeries> {
    Boundaries {
        rain: six_hourly([0.0, 4.0, 12.0, 2.0, 0.0]),
        inflow_a: six_hourly([24.0; 5]),
        inflow_b: six_hourly([800.0; 5]),
        tide: six_hourly([0.2, 1.1, -0.4, 0.9, 0.1]),
    }
}

pub fn request() -> SimulationRequest {
    SimulationRequest {
        start_date: START.to_string(),
        end_date: END.to_string(),
        boundaries: boundaries(),
        nodes: None,
    }
}

/// Default config rooted in `dir`, with the template written to disk.
pub fn config_in(dir: &Path) -> ServiceConfig {
    let template = dir.join("model.inp");
    std::fs::write(&template, TEMPLATE).expect("write template");

    let mut config = ServiceConfig::default();
    config.paths.template = template;
    config.paths.work_dir = dir.join("work");
    config.paths.cache_dir = dir.join("cache");
    config
}

pub fn pipeline(config: &ServiceConfig, solver: ScriptedSolver) -> Pipeline<ScriptedSolver> {
    let template = ModelTemplate::load(&config.paths.template).expect("load template");
    Pipeline::new(config, template, solver).expect("pipeline")
}

pub fn still_water_manager(config: &ServiceConfig) -> Arc<JobManager<ScriptedSolver>> {
    let solver = ScriptedSolver::still_water(&SolverConfig::default());
    Arc::new(JobManager::in_memory(
        Arc::new(pipeline(config, solver)),
        config.jobs.timeout(),
    ))
}
