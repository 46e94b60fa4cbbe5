//! Request/response types for the ingress API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{TestCase, TestRunResult};

/// `POST /upload` response: where the file landed plus what it declares.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_path: String,
    /// `"<METHOD> <path>"` descriptors, in document order.
    pub endpoints: Vec<String>,
}

/// `POST /generate-tests` request body.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateTestsRequest {
    #[serde(alias = "SwaggerFilePath")]
    pub swagger_file_path: String,

    #[serde(alias = "SelectedEndpoints")]
    pub selected_endpoints: Vec<String>,
}

/// `POST /execute-tests` request body.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteTestsRequest {
    #[serde(alias = "TestCases")]
    pub test_cases: Vec<TestCase>,

    #[serde(alias = "BaseUrl")]
    pub base_url: String,

    #[serde(alias = "GlobalHeaders")]
    pub global_headers: IndexMap<String, String>,

    #[serde(alias = "GlobalVariables")]
    pub global_variables: IndexMap<String, Value>,
}

/// Run report with the derived counts materialized for the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResponse {
    #[serde(flatten)]
    pub run: TestRunResult,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub tests_blocked: usize,
    pub tests_with_error: usize,
}

impl From<TestRunResult> for TestRunResponse {
    fn from(run: TestRunResult) -> Self {
        Self {
            tests_passed: run.tests_passed(),
            tests_failed: run.tests_failed(),
            tests_skipped: run.tests_skipped(),
            tests_blocked: run.tests_blocked(),
            tests_with_error: run.tests_with_error(),
            run,
        }
    }
}

/// Error envelope for every handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
