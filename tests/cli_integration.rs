//! Runs the `floodcast` binary end to end.

mod common;

use std::process::Command;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let config = common::config_in(dir);
    let toml = format!(
        "[paths]\ntemplate = \"{}\"\nwork_dir = \"{}\"\ncache_dir = \"{}\"\n\n[flood]\nmethod = \"ratio\"\n",
        config.paths.template.display(),
        config.paths.work_dir.display(),
        config.paths.cache_dir.display(),
    );
    let path = dir.join("floodcast.toml");
    std::fs::write(&path, toml).expect("write config");
    path
}

#[test]
fn synthetic_run_prints_summary_and_exports_csv() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = write_config(dir.path());
    let csv = dir.path().join("nodes.csv");

    let output = Command::new(env!("CARGO_BIN_EXE_floodcast"))
        .arg("--config")
        .arg(&config)
        .args(["--synthetic", common::START, common::END, "--seed", "7"])
        .arg("--csv-out")
        .arg(&csv)
        .args(["--log-level", "warn"])
        .output()
        .expect("floodcast should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.contains("LOW")), "{stdout}");

    let exported = std::fs::read_to_string(&csv).expect("csv written");
    let mut lines = exported.lines();
    assert_eq!(
        lines.next(),
        Some("node,time,depth,inflow,water_level,invert_elevation")
    );
    assert_eq!(lines.count(), 4 * 25);
}

#[test]
fn invalid_config_exits_with_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[flood]\nmethod = \"guess\"\n").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_floodcast"))
        .arg("--config")
        .arg(&path)
        .args(["--synthetic", common::START, common::END])
        .output()
        .expect("floodcast should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("flood.method"));
}

#[test]
fn missing_request_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_floodcast"))
        .output()
        .expect("floodcast should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--request"));
}
