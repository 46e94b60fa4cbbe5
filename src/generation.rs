//! Test generation: OpenAPI document + endpoint selection → LLM →
//! validated test cases.
//!
//! The LLM output is treated as untrusted text; everything that comes
//! back goes through the extractor's validation gate.

use crate::error::Result;
use crate::extractor::extract_test_cases;
use crate::llm::Llm;
use crate::models::TestCase;
use crate::openapi;
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are an API test engineer. You produce REST API test cases \
as a JSON array and nothing else. Each test case object has the fields: testCaseId, \
testCaseName, description, priority (Lowest|Low|Medium|High|Highest), tags, prerequisites \
(array of testCaseIds), variables, authentication, request (method, path, headers, \
pathParameters, queryParameters, contentType, body, formParameters), expectedResponse \
(statusCode), assertions (assertionType, target, condition, expectedValue), \
extractVariables (name, source, path, regex), skip. Use {{variable}} placeholders to chain \
values between dependent tests.";

/// Caps how much of the document is pasted into the prompt.
const MAX_SPEC_CHARS: usize = 60_000;

pub struct TestGenerator<L: Llm> {
    llm: L,
}

impl<L: Llm> TestGenerator<L> {
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    /// Generate test cases for the selected endpoints (all endpoints
    /// when the selection is empty).
    pub async fn generate(
        &self,
        spec: &Value,
        selected_endpoints: &[String],
    ) -> Result<Vec<TestCase>> {
        let endpoints = if selected_endpoints.is_empty() {
            openapi::list_endpoints(spec)
        } else {
            selected_endpoints.to_vec()
        };

        let prompt = build_prompt(spec, &endpoints);
        log::info!(
            "Requesting test generation for {} endpoint(s)",
            endpoints.len()
        );

        let response = self.llm.complete_with_system(SYSTEM_PROMPT, &prompt).await?;
        let cases = extract_test_cases(&response);
        log::info!("Extracted {} test case(s) from LLM output", cases.len());
        Ok(cases)
    }
}

fn build_prompt(spec: &Value, endpoints: &[String]) -> String {
    let mut spec_text = spec.to_string();
    if spec_text.len() > MAX_SPEC_CHARS {
        let mut end = MAX_SPEC_CHARS;
        while !spec_text.is_char_boundary(end) {
            end -= 1;
        }
        spec_text.truncate(end);
    }

    let endpoint_list = endpoints
        .iter()
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate executable test cases for these endpoints:\n{endpoint_list}\n\n\
        Cover the happy path plus relevant negative cases, and chain dependent \
        operations with prerequisites and extractVariables.\n\n\
        OpenAPI document:\n{spec_text}"
    )
}
