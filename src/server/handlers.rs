//! HTTP route handlers for the ingress API.
//!
//! Handlers stay thin: validate input, delegate to the pipeline,
//! translate failures into the error envelope.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use super::models::{
    ApiError, ExecuteTestsRequest, GenerateTestsRequest, TestRunResponse, UploadResponse,
};
use super::AppState;
use crate::cancel::RunCancellation;
use crate::coordinator::{RunRequest, TestRunCoordinator};
use crate::generation::TestGenerator;
use crate::llm;
use crate::models::TestCase;
use crate::openapi;

/// POST `/upload` - store one OpenAPI document, list its endpoints.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart payload: {e}")))?
        .ok_or_else(|| ApiError::bad_request("no file in upload"))?;

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
    if data.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }

    let upload_dir = Path::new(&state.settings.server.upload_dir);
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("cannot create upload directory: {e}")))?;

    // Randomised name so concurrent uploads never collide.
    let file_path = upload_dir.join(format!("{}.json", Uuid::new_v4()));
    tokio::fs::write(&file_path, &data)
        .await
        .map_err(|e| ApiError::internal(format!("cannot store upload: {e}")))?;

    let spec = openapi::load_spec(&file_path)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let endpoints = openapi::list_endpoints(&spec);

    log::info!(
        "Stored OpenAPI document at {} ({} endpoint(s))",
        file_path.display(),
        endpoints.len()
    );

    Ok(Json(UploadResponse {
        file_path: file_path.display().to_string(),
        endpoints,
    }))
}

/// POST `/generate-tests` - LLM-generate test cases for a stored spec.
pub async fn generate_tests(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateTestsRequest>,
) -> Result<Json<Vec<TestCase>>, ApiError> {
    if request.swagger_file_path.trim().is_empty() {
        return Err(ApiError::bad_request("swaggerFilePath is required"));
    }

    let spec = openapi::load_spec(&request.swagger_file_path)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let client = llm::build_client(&state.settings.llm)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let generator = TestGenerator::new(client);

    let cases = generator
        .generate(&spec, &request.selected_endpoints)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(cases))
}

/// POST `/execute-tests` - run a suite against a live base URL.
pub async fn execute_tests(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteTestsRequest>,
) -> Result<Json<TestRunResponse>, ApiError> {
    let coordinator = TestRunCoordinator::new(state.settings.execution.clone());
    let run = coordinator
        .execute(
            RunRequest {
                test_cases: request.test_cases,
                base_url: request.base_url,
                global_headers: request.global_headers,
                global_variables: request.global_variables,
            },
            RunCancellation::new(),
        )
        .await;

    Ok(Json(TestRunResponse::from(run)))
}
