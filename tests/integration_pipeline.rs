//! End-to-end runs of the pipeline against the scripted solver.

mod common;

use std::sync::Arc;

use floodcast::config::{BoundaryConfig, SolverConfig};
use floodcast::error::PipelineError;
use floodcast::flood::FloodRisk;
use floodcast::model::{ModelComposer, ModelTemplate, NodeKind};
use floodcast::series::SimulationWindow;
use floodcast::series::timefmt::parse_timestamp;
use floodcast::sim::{RunControl, ScriptedSolver};

#[test]
fn still_water_run_reports_every_node_low() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = common::config_in(dir.path());
    let pipeline = common::pipeline(&config, ScriptedSolver::still_water(&config.solver));

    let result = pipeline
        .run(&common::request(), &RunControl::new())
        .expect("run should succeed");

    let ids: Vec<&str> = result.nodes.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["0DN", "0SG", "J1", "J2"]);
    assert_eq!(result.flood.len(), 4);

    for (id, node) in &result.nodes {
        let series = &node.time_series;
        let first = series.first().expect("samples").time;
        let last = series.last().expect("samples").time;
        assert_eq!((last - first).num_hours(), 24, "{id} should span the window");
        for pair in series.windows(2) {
            let gap = pair[1].time - pair[0].time;
            assert!(gap.num_minutes() <= 60, "{id}: gap of {gap}");
        }
        assert_eq!(node.max_depth_m, 0.0);
        assert_eq!(result.flood[id].risk, FloodRisk::Low);
    }
    assert_eq!(result.nodes["J1"].invert_elevation, 1.0);
}

#[test]
fn scripted_depths_drive_the_classification() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = common::config_in(dir.path());
    config.cache.enabled = false;
    let solver = ScriptedSolver::new(
        &config.solver,
        Arc::new(|id, _| match id {
            "J1" => 1.4,
            "J2" => 0.6,
            _ => 0.0,
        }),
    );
    let pipeline = common::pipeline(&config, solver);

    let result = pipeline
        .run(&common::request(), &RunControl::new())
        .expect("run should succeed");

    // J1: 1.4 / 1.5, J2: 0.6 / 1.5
    assert_eq!(result.flood["J1"].risk, FloodRisk::Critical);
    assert_eq!(result.flood["J1"].probability, 0.9);
    assert_eq!(result.flood["J2"].risk, FloodRisk::Medium);
    assert_eq!(result.flood["0DN"].risk, FloodRisk::Low);
    assert!((result.nodes["J1"].max_water_level_m - 2.4).abs() < 1e-9);
}

#[test]
fn node_filter_restricts_the_result() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = common::config_in(dir.path());
    let pipeline = common::pipeline(&config, ScriptedSolver::still_water(&config.solver));

    let mut request = common::request();
    request.nodes = Some(vec!["J2".to_string(), "0SG".to_string()]);
    let result = pipeline.run(&request, &RunControl::new()).expect("run");
    let ids: Vec<&str> = result.nodes.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["0SG", "J2"]);
    assert_eq!(result.flood.len(), 2);

    request.nodes = Some(vec!["NOPE".to_string()]);
    let err = pipeline.run(&request, &RunControl::new()).unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));
}

#[test]
fn malformed_series_fails_before_the_solver() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = common::config_in(dir.path());
    config.cache.enabled = false;
    let pipeline = common::pipeline(
        &config,
        ScriptedSolver::still_water(&config.solver).failing("must not be reached"),
    );

    let mut request = common::request();
    request
        .boundaries
        .tide
        .insert("09/01/2024 25:00".to_string(), 0.5.into());
    let err = pipeline.run(&request, &RunControl::new()).unwrap_err();
    match err {
        PipelineError::Format { key, .. } => assert_eq!(key, "09/01/2024 25:00"),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn solver_failure_surfaces_as_simulation_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = common::config_in(dir.path());
    config.cache.enabled = false;
    let pipeline = common::pipeline(
        &config,
        ScriptedSolver::still_water(&config.solver).failing("ERROR 209: undefined object"),
    );

    let err = pipeline
        .run(&common::request(), &RunControl::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Simulation(_)));
    assert!(err.to_string().contains("ERROR 209"));
}

#[test]
fn cached_result_is_served_without_the_solver() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = common::config_in(dir.path());

    let first = common::pipeline(&config, ScriptedSolver::still_water(&config.solver))
        .run(&common::request(), &RunControl::new())
        .expect("first run");

    let broken = common::pipeline(
        &config,
        ScriptedSolver::still_water(&config.solver).failing("solver unavailable"),
    );
    let second = broken
        .run(&common::request(), &RunControl::new())
        .expect("second run should hit the cache");
    assert_eq!(first.nodes, second.nodes);

    let mut changed = common::request();
    changed.end_date = "09/01/2024 12:00".to_string();
    assert!(broken.run(&changed, &RunControl::new()).is_err());
}

#[test]
fn composing_twice_is_byte_identical() {
    let template = ModelTemplate::from_text(common::TEMPLATE);
    let composer = ModelComposer::new(BoundaryConfig::default());
    let series = common::boundaries().resample().expect("resample");
    let window = SimulationWindow::new(
        parse_timestamp(common::START).expect("start"),
        parse_timestamp(common::END).expect("end"),
    )
    .expect("window");

    let once = composer
        .compose(template.text(), &series, &window)
        .expect("compose");
    let twice = composer.compose(&once, &series, &window).expect("recompose");
    assert_eq!(once, twice);

    assert_eq!(once.matches("[INFLOWS]").count(), 1);
    assert_eq!(once.matches("[TIMESERIES]").count(), 1);
    assert!(!once.contains("OLD_SERIES"));
    assert!(once.contains("START_DATE           09/01/2024"));
    assert!(once.contains("END_DATE             09/02/2024"));
    assert!(once.contains("[COORDINATES]"));
}

#[test]
fn registry_matches_template_tables() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = common::config_in(dir.path());
    let pipeline = common::pipeline(&config, ScriptedSolver::still_water(&SolverConfig::default()));

    let nodes = pipeline.nodes();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes.get("0SG").map(|n| n.kind), Some(NodeKind::Storage));
    assert_eq!(nodes.get("0DN").map(|n| n.kind), Some(NodeKind::Junction));
    assert!(nodes.fallbacks().is_empty());
}
