//! Data model for test cases, assertions, and run results.
//!
//! Wire casing is camelCase; PascalCase aliases are accepted on input
//! because the generation LLM and older control planes emit either.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single executable test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestCase {
    #[serde(alias = "TestCaseId", alias = "id")]
    pub test_case_id: String,

    #[serde(alias = "TestCaseName", alias = "name")]
    pub test_case_name: String,

    #[serde(alias = "Description")]
    pub description: Option<String>,

    #[serde(alias = "Priority")]
    pub priority: Priority,

    #[serde(alias = "Tags")]
    pub tags: Vec<String>,

    /// Test case ids that must pass before this one may run.
    #[serde(alias = "Prerequisites")]
    pub prerequisites: Vec<String>,

    /// Test-scoped variables, highest precedence in the variable context.
    #[serde(alias = "Variables")]
    pub variables: IndexMap<String, Value>,

    #[serde(alias = "Authentication")]
    pub authentication: Option<Authentication>,

    #[serde(alias = "Request")]
    pub request: Option<Request>,

    #[serde(alias = "ExpectedResponse")]
    pub expected_response: Option<ExpectedResponse>,

    #[serde(alias = "Assertions")]
    pub assertions: Vec<Assertion>,

    #[serde(alias = "ExtractVariables", alias = "extractionRules")]
    pub extract_variables: Vec<VariableExtractionRule>,

    #[serde(alias = "Skip")]
    pub skip: bool,
}

impl Default for TestCase {
    fn default() -> Self {
        Self {
            test_case_id: String::new(),
            test_case_name: String::new(),
            description: None,
            priority: Priority::Medium,
            tags: Vec::new(),
            prerequisites: Vec::new(),
            variables: IndexMap::new(),
            authentication: None,
            request: None,
            expected_response: None,
            assertions: Vec::new(),
            extract_variables: Vec::new(),
            skip: false,
        }
    }
}

impl TestCase {
    /// A test case is usable iff it has an id, a name, and a request with
    /// a non-empty path. Anything else from the LLM is discarded.
    pub fn is_valid(&self) -> bool {
        !self.test_case_id.trim().is_empty()
            && !self.test_case_name.trim().is_empty()
            && self
                .request
                .as_ref()
                .is_some_and(|r| !r.path.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Priority {
    #[serde(alias = "lowest")]
    Lowest,
    #[serde(alias = "low")]
    Low,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "highest")]
    Highest,
}

/// The HTTP request a test case issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    #[serde(alias = "Method")]
    pub method: HttpMethod,

    /// Relative path; may contain `{name}` path placeholders and
    /// `{{var}}` variables.
    #[serde(alias = "Path", alias = "url", alias = "Url")]
    pub path: String,

    #[serde(alias = "Headers")]
    pub headers: IndexMap<String, String>,

    #[serde(alias = "PathParameters")]
    pub path_parameters: IndexMap<String, String>,

    #[serde(alias = "QueryParameters")]
    pub query_parameters: IndexMap<String, String>,

    /// Explicit content type; inferred from the body shape when absent.
    #[serde(alias = "ContentType")]
    pub content_type: Option<String>,

    /// String or structured JSON body.
    #[serde(alias = "Body")]
    pub body: Option<Value>,

    #[serde(alias = "FormParameters")]
    pub form_parameters: IndexMap<String, String>,

    #[serde(alias = "FileParameters")]
    pub file_parameters: Vec<FileParameter>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            path: String::new(),
            headers: IndexMap::new(),
            path_parameters: IndexMap::new(),
            query_parameters: IndexMap::new(),
            content_type: None,
            body: None,
            form_parameters: IndexMap::new(),
            file_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "Get", alias = "get")]
    Get,
    #[serde(alias = "Post", alias = "post")]
    Post,
    #[serde(alias = "Put", alias = "put")]
    Put,
    #[serde(alias = "Delete", alias = "delete")]
    Delete,
    #[serde(alias = "Patch", alias = "patch")]
    Patch,
    #[serde(alias = "Head", alias = "head")]
    Head,
    #[serde(alias = "Options", alias = "options")]
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether a request body is sent for this method.
    pub fn allows_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multipart file part: inline base64 content or a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FileParameter {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "FileName")]
    pub file_name: Option<String>,

    #[serde(alias = "ContentType")]
    pub content_type: Option<String>,

    #[serde(alias = "FileContentBase64")]
    pub file_content_base64: Option<String>,

    #[serde(alias = "FilePath")]
    pub file_path: Option<String>,
}

/// Authentication applied to the outgoing request.
/// All string fields are variable-expandable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Authentication {
    #[default]
    #[serde(alias = "None")]
    None,
    #[serde(alias = "Basic")]
    Basic {
        #[serde(alias = "Username")]
        username: String,
        #[serde(alias = "Password")]
        password: String,
    },
    #[serde(alias = "Bearer")]
    Bearer {
        #[serde(alias = "Token")]
        token: String,
    },
    #[serde(alias = "ApiKey")]
    ApiKey {
        #[serde(alias = "HeaderName", default)]
        header_name: String,
        #[serde(alias = "Value")]
        value: String,
        #[serde(alias = "Location", default)]
        location: ApiKeyLocation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ApiKeyLocation {
    #[default]
    #[serde(alias = "header")]
    Header,
    #[serde(alias = "query")]
    Query,
}

/// Shorthand expectation; a missing assertion list falls back to this.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpectedResponse {
    #[serde(alias = "StatusCode")]
    pub status_code: Option<u16>,
}

/// One assertion: what to read, how to compare, what to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assertion {
    #[serde(alias = "Type", alias = "type", alias = "AssertionType")]
    pub assertion_type: AssertionType,

    /// Header name, JSON path, or empty depending on the type.
    #[serde(alias = "Target")]
    pub target: String,

    #[serde(alias = "Condition")]
    pub condition: AssertionCondition,

    #[serde(alias = "ExpectedValue")]
    pub expected_value: Value,
}

impl Default for Assertion {
    fn default() -> Self {
        Self {
            assertion_type: AssertionType::StatusCode,
            target: String::new(),
            condition: AssertionCondition::Equals,
            expected_value: Value::Null,
        }
    }
}

impl Assertion {
    pub fn status_code_equals(expected: u16) -> Self {
        Self {
            assertion_type: AssertionType::StatusCode,
            target: String::new(),
            condition: AssertionCondition::Equals,
            expected_value: Value::from(expected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionType {
    #[serde(alias = "statusCode")]
    StatusCode,
    #[serde(alias = "responseTime")]
    ResponseTime,
    #[serde(alias = "headerExists")]
    HeaderExists,
    #[serde(alias = "headerValue")]
    HeaderValue,
    #[serde(alias = "bodyContainsString")]
    BodyContainsString,
    #[serde(alias = "bodyEqualsString")]
    BodyEqualsString,
    #[serde(alias = "bodyMatchesRegex")]
    BodyMatchesRegex,
    #[serde(alias = "jsonPathValue")]
    JsonPathValue,
    #[serde(alias = "jsonPathExists")]
    JsonPathExists,
    #[serde(alias = "jsonPathNotExists")]
    JsonPathNotExists,
    #[serde(alias = "arrayLength")]
    ArrayLength,
    #[serde(alias = "arrayContains")]
    ArrayContains,
    #[serde(alias = "jsonSchemaValidation")]
    JsonSchemaValidation,
    #[serde(alias = "xmlPathValue")]
    XmlPathValue,
    #[serde(alias = "xmlSchemaValidation")]
    XmlSchemaValidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionCondition {
    #[serde(alias = "equals")]
    Equals,
    #[serde(alias = "notEquals")]
    NotEquals,
    #[serde(alias = "greaterThan")]
    GreaterThan,
    #[serde(alias = "greaterThanOrEqual")]
    GreaterThanOrEqual,
    #[serde(alias = "lessThan")]
    LessThan,
    #[serde(alias = "lessThanOrEqual")]
    LessThanOrEqual,
    #[serde(alias = "contains")]
    Contains,
    #[serde(alias = "notContains")]
    NotContains,
    #[serde(alias = "matchesRegex")]
    MatchesRegex,
    #[serde(alias = "notMatchesRegex")]
    NotMatchesRegex,
    #[serde(alias = "exists")]
    Exists,
    #[serde(alias = "notExists")]
    NotExists,
    #[serde(alias = "isNull")]
    IsNull,
    #[serde(alias = "isNotNull")]
    IsNotNull,
    #[serde(alias = "isEmpty")]
    IsEmpty,
    #[serde(alias = "isNotEmpty")]
    IsNotEmpty,
    #[serde(alias = "isValid")]
    IsValid,
}

impl std::fmt::Display for AssertionCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssertionCondition::Equals => "Equals",
            AssertionCondition::NotEquals => "NotEquals",
            AssertionCondition::GreaterThan => "GreaterThan",
            AssertionCondition::GreaterThanOrEqual => "GreaterThanOrEqual",
            AssertionCondition::LessThan => "LessThan",
            AssertionCondition::LessThanOrEqual => "LessThanOrEqual",
            AssertionCondition::Contains => "Contains",
            AssertionCondition::NotContains => "NotContains",
            AssertionCondition::MatchesRegex => "MatchesRegex",
            AssertionCondition::NotMatchesRegex => "NotMatchesRegex",
            AssertionCondition::Exists => "Exists",
            AssertionCondition::NotExists => "NotExists",
            AssertionCondition::IsNull => "IsNull",
            AssertionCondition::IsNotNull => "IsNotNull",
            AssertionCondition::IsEmpty => "IsEmpty",
            AssertionCondition::IsNotEmpty => "IsNotEmpty",
            AssertionCondition::IsValid => "IsValid",
        };
        f.write_str(name)
    }
}

/// Where a variable extraction rule reads its raw value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExtractionSource {
    #[default]
    #[serde(alias = "body", alias = "response")]
    ResponseBody,
    #[serde(alias = "header")]
    ResponseHeader,
    #[serde(alias = "status", alias = "statusCode")]
    ResponseStatusCode,
}

/// Rule binding a response value to a named variable for dependents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableExtractionRule {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "Source")]
    pub source: ExtractionSource,

    /// Dotted JSON path for body, header name for header.
    #[serde(alias = "Path")]
    pub path: String,

    /// Optional refinement: capture group 1, or the whole match when the
    /// pattern has no groups.
    #[serde(alias = "Regex")]
    pub regex: Option<String>,
}

/// Terminal and intermediate states of a test case within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TestStatus {
    #[default]
    Pending,
    Skipped,
    Running,
    Passed,
    Failed,
    Error,
    Blocked,
}

/// Outcome of one assertion evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub assertion_type: AssertionType,
    pub target: String,
    pub condition: AssertionCondition,
    pub expected_value: Value,
    pub passed: bool,
    pub actual_value: Option<Value>,
    pub message: Option<String>,
}

/// Echo of the request that was actually sent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestInfo {
    pub url: String,
    pub method: String,
    pub headers: IndexMap<String, String>,
    /// First bytes of an outgoing body, for the report.
    pub body_preview: Option<String>,
}

/// Echo of the response that was received.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseInfo {
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
    /// Set when the body exceeded the configured cap and was cut off.
    pub body_truncated: bool,
}

/// Result of one test case within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub test_case_name: String,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Request time of the reported attempt, in milliseconds.
    pub duration_ms: u64,
    pub request: Option<RequestInfo>,
    pub response: Option<ResponseInfo>,
    pub assertion_results: Vec<AssertionResult>,
    pub extracted_variables: IndexMap<String, Value>,
    pub error_message: Option<String>,
    pub retry_attempts: u32,
}

impl TestCaseResult {
    /// Fresh result in Pending state, created when scheduling begins.
    pub fn pending(test_case: &TestCase) -> Self {
        let now = Utc::now();
        Self {
            test_case_id: test_case.test_case_id.clone(),
            test_case_name: test_case.test_case_name.clone(),
            status: TestStatus::Pending,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            request: None,
            response: None,
            assertion_results: Vec::new(),
            extracted_variables: IndexMap::new(),
            error_message: None,
            retry_attempts: 0,
        }
    }

    /// Terminal result produced without issuing any HTTP request.
    pub fn terminal(
        test_case: &TestCase,
        status: TestStatus,
        message: impl Into<String>,
    ) -> Self {
        let mut result = Self::pending(test_case);
        result.status = status;
        result.error_message = Some(message.into());
        result.end_time = Utc::now();
        result
    }
}

/// Aggregated outcome of one run.
///
/// Counts are derived from the results on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_url: String,
    pub total_tests: usize,
    pub global_variables: IndexMap<String, Value>,
    pub test_case_results: Vec<TestCaseResult>,
}

impl TestRunResult {
    fn count(&self, status: TestStatus) -> usize {
        self.test_case_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn tests_passed(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    pub fn tests_failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    pub fn tests_skipped(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    pub fn tests_blocked(&self) -> usize {
        self.count(TestStatus::Blocked)
    }

    pub fn tests_with_error(&self) -> usize {
        self.count(TestStatus::Error)
    }

    pub fn all_passed(&self) -> bool {
        self.tests_passed() == self.total_tests
    }
}
