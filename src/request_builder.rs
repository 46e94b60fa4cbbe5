//! Outgoing request composition.
//!
//! Order matters here: path expansion and placeholder substitution, then
//! query parameters, then authentication, then header merging, then body
//! selection. Content-Type never lands in the header map directly; it is
//! set with the content.

use crate::error::{Result, TorqError};
use crate::models::{
    ApiKeyLocation, Authentication, HttpMethod, Request, RequestInfo, TestCase,
};
use crate::variables::{self, VariableContext};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use indexmap::IndexMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;
use reqwest::Client;
use url::Url;

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";
const BODY_PREVIEW_BYTES: usize = 2048;

/// Ensure the base URL ends with a single trailing slash so relative
/// paths resolve under it.
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Build the outgoing request plus its echo for the report.
///
/// Rebuilt per attempt: multipart bodies are single-use streams.
pub async fn build_request(
    client: &Client,
    test_case: &TestCase,
    base_url: &str,
    global_headers: &IndexMap<String, String>,
    ctx: &VariableContext,
) -> Result<(reqwest::Request, RequestInfo)> {
    let request = test_case
        .request
        .as_ref()
        .ok_or_else(|| TorqError::Configuration("test case has no request".to_string()))?;

    let mut url = compose_url(request, base_url, ctx)?;

    // Authentication comes before per-test headers so tests can override.
    let mut headers: IndexMap<String, String> = IndexMap::new();
    for (name, value) in global_headers {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        insert_header(&mut headers, name, &variables::expand(value, ctx));
    }
    apply_authentication(test_case, &mut headers, &mut url, ctx);
    for (name, value) in &request.headers {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        insert_header(&mut headers, name, &variables::expand(value, ctx));
    }

    let content_type = effective_content_type(request);
    let method = to_reqwest_method(request.method);

    let mut builder = client.request(method, url.clone());
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let mut body_preview = None;
    if request.method.allows_body() {
        match select_body(request, &content_type, ctx).await? {
            RequestBody::Raw(text) => {
                body_preview = Some(truncate_preview(&text));
                builder = builder
                    .header(CONTENT_TYPE, content_type.as_str())
                    .body(text);
            }
            RequestBody::Multipart(form) => {
                body_preview = Some(format!("<multipart: {} part(s)>", form.1));
                builder = builder.multipart(form.0);
            }
            RequestBody::None => {}
        }
    }

    let built = builder.build()?;

    let mut echo_headers = headers;
    if built.body().is_some() && !content_type.starts_with(CONTENT_TYPE_MULTIPART) {
        echo_headers.insert("content-type".to_string(), content_type);
    }

    let info = RequestInfo {
        url: url.to_string(),
        method: request.method.to_string(),
        headers: echo_headers,
        body_preview,
    };

    Ok((built, info))
}

enum RequestBody {
    Raw(String),
    /// Form plus part count for the echo.
    Multipart((multipart::Form, usize)),
    None,
}

/// Steps 1 and 2: expand the path, substitute `{name}` placeholders with
/// percent-encoded path parameter values, append ordered query pairs.
fn compose_url(request: &Request, base_url: &str, ctx: &VariableContext) -> Result<Url> {
    let base = Url::parse(&normalize_base_url(base_url))?;

    let expanded_path = variables::expand(&request.path, ctx);
    let (path_part, inline_query) = match expanded_path.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (expanded_path, None),
    };

    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| TorqError::Configuration(format!("base URL '{base_url}' cannot be a base")))?;
        segments.pop_if_empty();
        for segment in path_part.trim_start_matches('/').split('/') {
            if segment.is_empty() {
                continue;
            }
            let resolved = substitute_path_placeholders(segment, request, ctx);
            segments.push(&resolved);
        }
    }

    if let Some(query) = inline_query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            url.query_pairs_mut().append_pair(&key, &value);
        }
    }

    for (key, value) in &request.query_parameters {
        url.query_pairs_mut()
            .append_pair(key, &variables::expand(value, ctx));
    }

    Ok(url)
}

/// Replace `{name}` tokens within one path segment from PathParameters.
/// Unknown placeholders stay literal; the resolved segment is
/// percent-encoded as a whole when pushed.
fn substitute_path_placeholders(segment: &str, request: &Request, ctx: &VariableContext) -> String {
    let mut resolved = segment.to_string();
    for (name, value) in &request.path_parameters {
        let token = format!("{{{name}}}");
        if resolved.contains(&token) {
            resolved = resolved.replace(&token, &variables::expand(value, ctx));
        }
    }
    resolved
}

fn apply_authentication(
    test_case: &TestCase,
    headers: &mut IndexMap<String, String>,
    url: &mut Url,
    ctx: &VariableContext,
) {
    match &test_case.authentication {
        None | Some(Authentication::None) => {}
        Some(Authentication::Basic { username, password }) => {
            let credentials = format!(
                "{}:{}",
                variables::expand(username, ctx),
                variables::expand(password, ctx)
            );
            insert_header(
                headers,
                "Authorization",
                &format!("Basic {}", BASE64_STANDARD.encode(credentials)),
            );
        }
        Some(Authentication::Bearer { token }) => {
            insert_header(
                headers,
                "Authorization",
                &format!("Bearer {}", variables::expand(token, ctx)),
            );
        }
        Some(Authentication::ApiKey {
            header_name,
            value,
            location,
        }) => {
            let expanded = variables::expand(value, ctx);
            match location {
                ApiKeyLocation::Header => insert_header(headers, header_name, &expanded),
                ApiKeyLocation::Query => {
                    url.query_pairs_mut().append_pair(header_name, &expanded);
                }
            }
        }
    }
}

/// Insert with case-insensitive override on the name.
fn insert_header(headers: &mut IndexMap<String, String>, name: &str, value: &str) {
    if let Some(existing) = headers
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned()
    {
        headers.shift_remove(&existing);
    }
    headers.insert(name.to_string(), value.to_string());
}

/// Explicit content type wins, then one declared in the header map
/// (which never reaches the wire as a plain header), then inference
/// from the body shape.
fn effective_content_type(request: &Request) -> String {
    if let Some(ct) = &request.content_type {
        if !ct.trim().is_empty() {
            return ct.trim().to_string();
        }
    }
    if let Some((_, ct)) = request
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
    {
        if !ct.trim().is_empty() {
            return ct.trim().to_string();
        }
    }
    if !request.file_parameters.is_empty() {
        CONTENT_TYPE_MULTIPART.to_string()
    } else if !request.form_parameters.is_empty() {
        CONTENT_TYPE_FORM.to_string()
    } else {
        CONTENT_TYPE_JSON.to_string()
    }
}

async fn select_body(
    request: &Request,
    content_type: &str,
    ctx: &VariableContext,
) -> Result<RequestBody> {
    if !request.file_parameters.is_empty() && content_type.starts_with(CONTENT_TYPE_MULTIPART) {
        return build_multipart(request, ctx).await.map(RequestBody::Multipart);
    }

    if !request.form_parameters.is_empty() && content_type == CONTENT_TYPE_FORM {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &request.form_parameters {
            serializer.append_pair(key, &variables::expand(value, ctx));
        }
        return Ok(RequestBody::Raw(serializer.finish()));
    }

    match &request.body {
        Some(serde_json::Value::String(text)) => {
            Ok(RequestBody::Raw(variables::expand(text, ctx)))
        }
        Some(structured) => {
            // Serialize first, then expand over the serialized text so
            // variables inside nested values resolve too.
            let serialized = serde_json::to_string(structured)?;
            Ok(RequestBody::Raw(variables::expand(&serialized, ctx)))
        }
        None => Ok(RequestBody::None),
    }
}

async fn build_multipart(
    request: &Request,
    ctx: &VariableContext,
) -> Result<(multipart::Form, usize)> {
    let mut form = multipart::Form::new();
    let mut parts = 0usize;

    for (key, value) in &request.form_parameters {
        form = form.text(key.clone(), variables::expand(value, ctx));
        parts += 1;
    }

    for file in &request.file_parameters {
        let bytes = if let Some(encoded) = &file.file_content_base64 {
            BASE64_STANDARD.decode(encoded.trim()).map_err(|e| {
                TorqError::Configuration(format!(
                    "Invalid base64 content for file part '{}': {e}",
                    file.name
                ))
            })?
        } else if let Some(path) = &file.file_path {
            let expanded = variables::expand(path, ctx);
            tokio::fs::read(&expanded)
                .await
                .map_err(|_| TorqError::FileNotFound(expanded.clone()))?
        } else {
            return Err(TorqError::Configuration(format!(
                "File part '{}' has neither inline content nor a path",
                file.name
            )));
        };

        let file_name = file
            .file_name
            .clone()
            .or_else(|| {
                file.file_path
                    .as_deref()
                    .and_then(|p| p.rsplit(['/', '\\']).next())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| file.name.clone());

        let mut part = multipart::Part::bytes(bytes).file_name(file_name);
        if let Some(ct) = &file.content_type {
            part = part
                .mime_str(ct)
                .map_err(|e| TorqError::Configuration(format!("Invalid part content type: {e}")))?;
        }
        form = form.part(file.name.clone(), part);
        parts += 1;
    }

    Ok((form, parts))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn truncate_preview(body: &str) -> String {
    if body.len() <= BODY_PREVIEW_BYTES {
        body.to_string()
    } else {
        let mut end = BODY_PREVIEW_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileParameter;
    use serde_json::json;

    fn test_case(request: Request) -> TestCase {
        TestCase {
            test_case_id: "tc".to_string(),
            test_case_name: "tc".to_string(),
            request: Some(request),
            ..TestCase::default()
        }
    }

    fn ctx(pairs: &[(&str, serde_json::Value)]) -> VariableContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_path_placeholder_substitution() {
        let client = Client::new();
        let mut request = Request {
            path: "/users/{id}".to_string(),
            ..Request::default()
        };
        request
            .path_parameters
            .insert("id".to_string(), "42".to_string());
        let tc = test_case(request);

        let (built, info) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(built.url().path(), "/users/42");
        assert!(info.url.ends_with("/users/42"));
    }

    #[tokio::test]
    async fn test_path_parameter_is_percent_encoded() {
        let client = Client::new();
        let mut request = Request {
            path: "/files/{name}".to_string(),
            ..Request::default()
        };
        request
            .path_parameters
            .insert("name".to_string(), "a b/c".to_string());
        let tc = test_case(request);

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999/",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(built.url().path(), "/files/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_base_url_with_prefix_path() {
        let client = Client::new();
        let request = Request {
            path: "/users".to_string(),
            ..Request::default()
        };
        let tc = test_case(request);

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999/api/v2",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(built.url().path(), "/api/v2/users");
    }

    #[tokio::test]
    async fn test_query_parameters_preserve_order_and_encode() {
        let client = Client::new();
        let mut request = Request {
            path: "/search".to_string(),
            ..Request::default()
        };
        request
            .query_parameters
            .insert("q".to_string(), "a b".to_string());
        request
            .query_parameters
            .insert("page".to_string(), "{{page}}".to_string());
        let tc = test_case(request);

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &ctx(&[("page", json!(3))]),
        )
        .await
        .unwrap();
        assert_eq!(built.url().query(), Some("q=a+b&page=3"));
    }

    #[tokio::test]
    async fn test_bearer_auth_and_per_test_override() {
        let client = Client::new();
        let mut request = Request {
            path: "/me".to_string(),
            ..Request::default()
        };
        request
            .headers
            .insert("Authorization".to_string(), "custom".to_string());
        let mut tc = test_case(request);
        tc.authentication = Some(Authentication::Bearer {
            token: "{{token}}".to_string(),
        });

        let (_, info) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &ctx(&[("token", json!("abc"))]),
        )
        .await
        .unwrap();
        // per-test header wins over the auth-provided one
        assert_eq!(info.headers.get("Authorization").map(|s| s.as_str()), Some("custom"));
    }

    #[tokio::test]
    async fn test_api_key_in_query() {
        let client = Client::new();
        let request = Request {
            path: "/data".to_string(),
            ..Request::default()
        };
        let mut tc = test_case(request);
        tc.authentication = Some(Authentication::ApiKey {
            header_name: "api_key".to_string(),
            value: "secret".to_string(),
            location: ApiKeyLocation::Query,
        });

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(built.url().query(), Some("api_key=secret"));
    }

    #[tokio::test]
    async fn test_json_body_with_variables() {
        let client = Client::new();
        let request = Request {
            method: HttpMethod::Post,
            path: "/users".to_string(),
            body: Some(json!({"name": "{{name}}", "age": 30})),
            ..Request::default()
        };
        let tc = test_case(request);

        let (built, info) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &ctx(&[("name", json!("alice"))]),
        )
        .await
        .unwrap();
        let body = built.body().unwrap().as_bytes().unwrap();
        assert_eq!(body, &br#"{"name":"alice","age":30}"#[..]);
        assert_eq!(
            info.headers.get("content-type").map(|s| s.as_str()),
            Some(CONTENT_TYPE_JSON)
        );
    }

    #[tokio::test]
    async fn test_get_request_carries_no_body() {
        let client = Client::new();
        let request = Request {
            method: HttpMethod::Get,
            path: "/users".to_string(),
            body: Some(json!({"ignored": true})),
            ..Request::default()
        };
        let tc = test_case(request);

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        assert!(built.body().is_none());
    }

    #[tokio::test]
    async fn test_form_encoded_body() {
        let client = Client::new();
        let mut request = Request {
            method: HttpMethod::Post,
            path: "/login".to_string(),
            ..Request::default()
        };
        request
            .form_parameters
            .insert("user".to_string(), "a b".to_string());
        request
            .form_parameters
            .insert("pass".to_string(), "{{pw}}".to_string());
        let tc = test_case(request);

        let (built, _) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &ctx(&[("pw", json!("x&y"))]),
        )
        .await
        .unwrap();
        let body = built.body().unwrap().as_bytes().unwrap();
        assert_eq!(body, &b"user=a+b&pass=x%26y"[..]);
    }

    #[tokio::test]
    async fn test_multipart_inferred_from_file_parameters() {
        let client = Client::new();
        let mut request = Request {
            method: HttpMethod::Post,
            path: "/upload".to_string(),
            ..Request::default()
        };
        request.file_parameters.push(FileParameter {
            name: "file".to_string(),
            file_name: Some("data.txt".to_string()),
            content_type: Some("text/plain".to_string()),
            file_content_base64: Some(BASE64_STANDARD.encode("hello")),
            file_path: None,
        });
        let tc = test_case(request);

        let (built, info) = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap();
        let ct = built
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(ct.starts_with("multipart/form-data"));
        assert_eq!(info.body_preview.as_deref(), Some("<multipart: 1 part(s)>"));
    }

    #[tokio::test]
    async fn test_missing_upload_file_is_configuration_error() {
        let client = Client::new();
        let mut request = Request {
            method: HttpMethod::Post,
            path: "/upload".to_string(),
            ..Request::default()
        };
        request.file_parameters.push(FileParameter {
            name: "file".to_string(),
            file_path: Some("/definitely/not/here.bin".to_string()),
            ..FileParameter::default()
        });
        let tc = test_case(request);

        let err = build_request(
            &client,
            &tc,
            "http://localhost:9999",
            &IndexMap::new(),
            &VariableContext::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TorqError::FileNotFound(_)));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://x"), "http://x/");
        assert_eq!(normalize_base_url("http://x/"), "http://x/");
    }
}
