mod utils;
#[allow(unused)]
use utils::*;

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn blocking_endpoint_returns_full_report() {
    let target = spawn_mock().await;
    let api = spawn_control_api().await;

    let response = reqwest::Client::new()
        .post(format!("http://{api}/loadtest"))
        .json(&json!({
            "target": format!("http://{target}/delay/ms/20"),
            "rate": 20.0,
            "duration_secs": 0.5,
            "max_concurrency": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await.unwrap();
    assert_eq!(report["state"], "completed");
    assert_eq!(report["error_count"], 0);
    assert_eq!(report["error_rate"], 0.0);

    let total = report["total_attempted"].as_u64().unwrap();
    assert!((9..=12).contains(&total), "total_attempted = {total}");
    assert_eq!(report["latencies"].as_array().unwrap().len() as u64, total);
    assert!(report["summary"]["latency_p50"].as_f64().unwrap() >= 0.02);
}

#[tokio::test]
async fn invalid_payloads_rejected_before_any_request() {
    let api = spawn_control_api().await;
    let client = reqwest::Client::new();

    // No terminal condition.
    let response = client
        .post(format!("http://{api}/loadtest"))
        .json(&json!({ "target": "http://127.0.0.1:1/" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Both terminal conditions.
    let response = client
        .post(format!("http://{api}/loadtest"))
        .json(&json!({
            "target": "http://127.0.0.1:1/",
            "duration_secs": 1.0,
            "request_count": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown field.
    let response = client
        .post(format!("http://{api}/loadtest"))
        .json(&json!({
            "target": "http://127.0.0.1:1/",
            "duration_secs": 1.0,
            "qps": 100,
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    // Zero rate.
    let response = client
        .post(format!("http://{api}/loadtest"))
        .json(&json!({
            "target": "http://127.0.0.1:1/",
            "duration_secs": 1.0,
            "rate": 0.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registered_run_streams_snapshots_to_completion() {
    let target = spawn_mock().await;
    let api = spawn_control_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{api}/runs"))
        .json(&json!({
            "target": format!("http://{target}/ok"),
            "rate": 10.0,
            "duration_secs": 1.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let report = poll_until_terminal(&client, &api.to_string(), &id).await;
    assert_eq!(report["state"], "completed");
    let total = report["total_attempted"].as_u64().unwrap();
    assert!((9..=11).contains(&total), "total_attempted = {total}");
}

#[tokio::test]
async fn runs_can_be_cancelled() {
    let target = spawn_mock().await;
    let api = spawn_control_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{api}/runs"))
        .json(&json!({
            "target": format!("http://{target}/ok"),
            "rate": 5.0,
            "duration_secs": 30.0,
        }))
        .send()
        .await
        .unwrap();
    let id = response.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = client
        .post(format!("http://{api}/runs/{id}/cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let report = poll_until_terminal(&client, &api.to_string(), &id).await;
    assert_eq!(report["state"], "cancelled");
    let total = report["total_attempted"].as_u64().unwrap();
    let errors = report["error_count"].as_u64().unwrap();
    let latencies = report["latencies"].as_array().unwrap().len() as u64;
    assert_eq!(errors + latencies, total);
}

#[tokio::test]
async fn unknown_run_id_is_404() {
    let api = spawn_control_api().await;
    let client = reqwest::Client::new();
    let id = "00000000-0000-0000-0000-000000000000";

    let response = client
        .get(format!("http://{api}/runs/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("http://{api}/runs/{id}/cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn poll_until_terminal(client: &reqwest::Client, api: &str, id: &str) -> Value {
    loop {
        let report: Value = client
            .get(format!("http://{api}/runs/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if report["state"] == "completed" || report["state"] == "cancelled" {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
