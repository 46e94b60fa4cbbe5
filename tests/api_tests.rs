use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use torq::server::{build_router, AppState};
use torq::settings::Settings;

/// Spin the ingress up on an ephemeral port and return its address.
async fn start_ingress(settings: Settings) -> SocketAddr {
    let state = Arc::new(AppState { settings });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_upload_returns_path_and_endpoints() {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.server.upload_dir = upload_dir.path().display().to_string();
    let addr = start_ingress(settings).await;

    let spec = json!({
        "openapi": "3.0.0",
        "paths": {
            "/pets": {"get": {}, "post": {}},
            "/pets/{id}": {"get": {}}
        }
    });

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::text(spec.to_string()).file_name("petstore.json"),
    );

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    let file_path = body["filePath"].as_str().unwrap();
    assert!(file_path.ends_with(".json"));
    assert!(std::path::Path::new(file_path).exists());

    let endpoints: Vec<&str> = body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert_eq!(endpoints, vec!["GET /pets", "POST /pets", "GET /pets/{id}"]);
}

#[tokio::test]
async fn test_upload_rejects_non_openapi_payload() {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.server.upload_dir = upload_dir.path().display().to_string();
    let addr = start_ingress(settings).await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::text("not json at all").file_name("junk.txt"),
    );

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("OpenAPI"));
}

#[tokio::test]
async fn test_execute_tests_round_trip() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&target)
        .await;

    let addr = start_ingress(Settings::default()).await;

    let request_body = json!({
        "baseUrl": target.uri(),
        "testCases": [
            {
                "testCaseId": "health",
                "testCaseName": "health check",
                "request": {"method": "GET", "path": "/health"},
                "assertions": [
                    {"assertionType": "StatusCode", "condition": "Equals", "expectedValue": 200},
                    {"assertionType": "JsonPathValue", "target": "ok", "condition": "Equals", "expectedValue": true}
                ]
            }
        ]
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/execute-tests"))
        .json(&request_body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalTests"], json!(1));
    assert_eq!(body["testsPassed"], json!(1));
    assert_eq!(body["testsFailed"], json!(0));
    assert_eq!(body["testCaseResults"][0]["status"], json!("Passed"));
    assert!(body["runId"].as_str().is_some());
}

#[tokio::test]
async fn test_execute_tests_with_empty_base_url_reports_errors() {
    let addr = start_ingress(Settings::default()).await;

    let request_body = json!({
        "baseUrl": "",
        "testCases": [
            {
                "testCaseId": "t",
                "testCaseName": "t",
                "request": {"method": "GET", "path": "/x"}
            }
        ]
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/execute-tests"))
        .json(&request_body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["testsWithError"], json!(1));
    assert_eq!(body["testCaseResults"][0]["status"], json!("Error"));
}

#[tokio::test]
async fn test_generate_tests_without_api_key_is_client_error() {
    let upload_dir = tempfile::tempdir().unwrap();
    let spec_path = upload_dir.path().join("spec.json");
    tokio::fs::write(&spec_path, json!({"paths": {}}).to_string())
        .await
        .unwrap();

    let mut settings = Settings::default();
    settings.llm.api_key = None;
    let addr = start_ingress(settings).await;

    // only runs meaningfully when no ambient key is configured
    if std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("TORQ_LLM_API_KEY").is_ok() {
        return;
    }

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/generate-tests"))
        .json(&json!({"swaggerFilePath": spec_path.display().to_string()}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
