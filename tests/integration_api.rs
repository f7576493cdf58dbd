//! Integration tests for the REST API feature.

#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use floodcast::api::{AppState, router};
use floodcast::sim::ScriptedSolver;

fn build_api_state(dir: &std::path::Path) -> Arc<AppState<ScriptedSolver>> {
    let config = common::config_in(dir);
    Arc::new(AppState {
        manager: common::still_water_manager(&config),
    })
}

fn request_body() -> String {
    serde_json::to_string(&common::request()).expect("serialize request")
}

async fn send(
    state: &Arc<AppState<ScriptedSolver>>,
    req: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let resp = router(Arc::clone(state))
        .oneshot(req)
        .await
        .expect("response");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, json)
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn sync_run_returns_nodes_and_flood_maps() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let (status, json) = send(&state, post_json("/simulations?mode=sync", request_body())).await;
    assert_eq!(status, StatusCode::OK);

    let nodes = json["nodes"].as_object().expect("nodes map");
    assert_eq!(nodes.len(), 4);
    let samples = json["nodes"]["J1"]["time_series"]
        .as_array()
        .expect("time series");
    assert_eq!(samples.len(), 25);
    assert_eq!(samples[0]["time"], "09/01/2024 00:00");
    assert_eq!(samples[24]["time"], "09/02/2024 00:00");

    for id in ["0DN", "0SG", "J1", "J2"] {
        assert_eq!(json["flood"][id]["risk"], "LOW", "{id}");
    }
}

#[tokio::test]
async fn async_run_can_be_polled_to_completion() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let (status, json) = send(&state, post_json("/simulations", request_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = json["job_id"].as_str().expect("job id").to_string();

    let mut job = serde_json::Value::Null;
    for _ in 0..500 {
        let (status, body) = send(&state, get(&format!("/simulations/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        job = body;
        if job["state"] == "succeeded" || job["state"] == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(job["state"], "succeeded");
    assert_eq!(job["progress"], 1.0);

    let (status, result) = send(&state, get(&format!("/simulations/{id}/result"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["flood"].as_object().map(|m| m.len()), Some(4));

    // Cancelling a finished job is a no-op.
    let (status, body) = send(
        &state,
        post_json(&format!("/simulations/{id}/cancel"), String::new()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn node_filter_with_unknown_id_is_404() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let mut request = common::request();
    request.nodes = Some(vec!["MISSING".to_string()]);
    let body = serde_json::to_string(&request).expect("serialize");

    let (status, json) = send(&state, post_json("/simulations?mode=sync", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap_or_default().contains("MISSING"));
}

#[tokio::test]
async fn inverted_window_is_400() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let mut request = common::request();
    request.end_date = "08/31/2024 00:00".to_string();
    let body = serde_json::to_string(&request).expect("serialize");

    let (status, json) = send(&state, post_json("/simulations?mode=sync", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap_or_default().contains("end_date"));
}

#[tokio::test]
async fn nodes_endpoint_reports_kinds() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let (status, json) = send(&state, get("/nodes")).await;
    assert_eq!(status, StatusCode::OK);
    let nodes = json.as_array().expect("node list");
    assert_eq!(nodes.len(), 4);
    let storage = nodes
        .iter()
        .find(|n| n["id"] == "0SG")
        .expect("storage node");
    assert_eq!(storage["kind"], "storage");
    assert_eq!(storage["max_depth"], 3.0);
}

#[tokio::test]
async fn single_node_lookup() {
    let dir = tempfile::tempdir().expect("temp dir");
    let state = build_api_state(dir.path());

    let (status, json) = send(&state, get("/nodes/J1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "junction");
    assert_eq!(json["invert_elevation"], 1.0);

    let (status, _) = send(&state, get("/nodes/UNKNOWN")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
