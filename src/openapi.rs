//! Endpoint discovery over an uploaded OpenAPI/Swagger document.
//!
//! Deliberately shallow: the generation pipeline only needs the list of
//! operations as `"<METHOD> <path>"` descriptors plus the raw document
//! to show the model.

use crate::error::{Result, TorqError};
use serde_json::Value;
use std::path::Path;

const HTTP_METHODS: [&str; 7] = ["get", "post", "put", "delete", "patch", "head", "options"];

/// Read and parse an OpenAPI JSON document from disk.
pub async fn load_spec(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| TorqError::FileNotFound(path.display().to_string()))?;
    let spec: Value = serde_json::from_str(&content)
        .map_err(|e| TorqError::Validation(format!("not a valid OpenAPI JSON document: {e}")))?;
    if spec.get("paths").is_none() {
        return Err(TorqError::Validation(
            "document has no 'paths' object".to_string(),
        ));
    }
    Ok(spec)
}

/// Discover endpoint descriptors of the form `"GET /users/{id}"`,
/// in document order.
pub fn list_endpoints(spec: &Value) -> Vec<String> {
    let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) else {
        return Vec::new();
    };

    let mut endpoints = Vec::new();
    for (path, operations) in paths {
        let Some(operations) = operations.as_object() else {
            continue;
        };
        for (method, _) in operations {
            if HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                endpoints.push(format!("{} {path}", method.to_ascii_uppercase()));
            }
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_endpoints() {
        let spec = json!({
            "openapi": "3.0.0",
            "paths": {
                "/users": {
                    "get": {"summary": "list"},
                    "post": {"summary": "create"}
                },
                "/users/{id}": {
                    "get": {},
                    "delete": {},
                    "parameters": [{"name": "id"}]
                }
            }
        });
        let endpoints = list_endpoints(&spec);
        assert_eq!(
            endpoints,
            vec![
                "GET /users",
                "POST /users",
                "GET /users/{id}",
                "DELETE /users/{id}"
            ]
        );
    }

    #[test]
    fn test_list_endpoints_without_paths() {
        assert!(list_endpoints(&json!({"openapi": "3.0.0"})).is_empty());
    }

    #[tokio::test]
    async fn test_load_spec_missing_file() {
        let err = load_spec("/nope/missing.json").await.unwrap_err();
        assert!(matches!(err, TorqError::FileNotFound(_)));
    }
}
