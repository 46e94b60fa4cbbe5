//! Single-test execution: build, send, assert, extract, retry.

use crate::assertions::{self, ResponseView};
use crate::cancel::RunCancellation;
use crate::error::TorqError;
use crate::extraction::extract_variables;
use crate::http_client::HttpClientPool;
use crate::models::{Assertion, TestCase, TestCaseResult, TestStatus};
use crate::request_builder::build_request;
use crate::settings::ExecutionSettings;
use crate::variables::VariableContext;
use chrono::Utc;
use indexmap::IndexMap;
use std::time::Instant;

const CANCELLED_MESSAGE: &str = "cancelled";

/// Executes one test case at a time against a shared client pool.
#[derive(Debug, Clone)]
pub struct TestRunner {
    pool: HttpClientPool,
    settings: ExecutionSettings,
}

enum AttemptOutcome {
    /// Request completed; the result carries Passed or Failed.
    Finished,
    /// DNS, connect, TLS, timeout, abort. Retry-eligible.
    Transport(String),
    /// Bad test definition (missing file, malformed URL). Never retried.
    Config(String),
    Cancelled,
}

impl TestRunner {
    pub fn new(pool: HttpClientPool, settings: ExecutionSettings) -> Self {
        Self { pool, settings }
    }

    /// Run one test with retries. Always returns a terminal result,
    /// never an error.
    pub async fn run_test(
        &self,
        test_case: &TestCase,
        base_url: &str,
        global_headers: &IndexMap<String, String>,
        ctx: &VariableContext,
        cancel: &RunCancellation,
    ) -> TestCaseResult {
        let mut result = TestCaseResult::pending(test_case);
        result.status = TestStatus::Running;
        result.start_time = Utc::now();

        let assertions = effective_assertions(test_case);
        let max_attempts = self.settings.max_retries + 1;
        let mut attempts: u32 = 0;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                result.status = TestStatus::Skipped;
                result.error_message = Some(CANCELLED_MESSAGE.to_string());
                break;
            }

            if attempt > 0 {
                log::debug!(
                    "Test '{}': retry {attempt} of {}",
                    test_case.test_case_id,
                    self.settings.max_retries
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        result.status = TestStatus::Skipped;
                        result.error_message = Some(CANCELLED_MESSAGE.to_string());
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.retry_delay()) => {}
                }
            }

            attempts = attempt + 1;

            match self
                .attempt(test_case, &assertions, base_url, global_headers, ctx, cancel, &mut result)
                .await
            {
                AttemptOutcome::Finished => {
                    if result.status == TestStatus::Passed {
                        break;
                    }
                    // Failed: retry while budget remains.
                }
                AttemptOutcome::Transport(message) => {
                    log::warn!(
                        "Test '{}': transport error: {message}",
                        test_case.test_case_id
                    );
                    result.status = TestStatus::Error;
                    result.error_message = Some(message);
                }
                AttemptOutcome::Config(message) => {
                    result.status = TestStatus::Error;
                    result.error_message = Some(message);
                    break;
                }
                AttemptOutcome::Cancelled => {
                    result.status = TestStatus::Skipped;
                    result.error_message = Some(CANCELLED_MESSAGE.to_string());
                    break;
                }
            }
        }

        result.retry_attempts = attempts.saturating_sub(1);
        result.end_time = Utc::now();
        result
    }

    /// One attempt: build, send, read, assert, extract.
    async fn attempt(
        &self,
        test_case: &TestCase,
        assertions: &[Assertion],
        base_url: &str,
        global_headers: &IndexMap<String, String>,
        ctx: &VariableContext,
        cancel: &RunCancellation,
        result: &mut TestCaseResult,
    ) -> AttemptOutcome {
        // Clear state a previous attempt may have left behind.
        result.assertion_results.clear();
        result.extracted_variables.clear();
        result.response = None;
        result.error_message = None;

        let (request, request_info) = match build_request(
            self.pool.client(),
            test_case,
            base_url,
            global_headers,
            ctx,
        )
        .await
        {
            Ok(pair) => pair,
            Err(TorqError::Http(e)) => return AttemptOutcome::Transport(e.to_string()),
            Err(e) => return AttemptOutcome::Config(e.to_string()),
        };
        result.request = Some(request_info);

        let started = Instant::now();
        let response = tokio::select! {
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
            sent = self.pool.client().execute(request) => match sent {
                Ok(response) => response,
                Err(e) => return AttemptOutcome::Transport(e.to_string()),
            }
        };

        let read = tokio::select! {
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
            body = self.pool.read_response(response) => match body {
                Ok(read) => read,
                Err(e) => return AttemptOutcome::Transport(e.to_string()),
            }
        };
        result.duration_ms = started.elapsed().as_millis() as u64;

        let view = ResponseView {
            status_code: read.status_code,
            headers: &read.headers,
            body: &read.body,
            duration_ms: result.duration_ms,
        };

        result.assertion_results = assertions::evaluate_all(assertions, &view, ctx);
        let passed = result.assertion_results.iter().all(|a| a.passed);
        result.status = if passed {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };

        // Extraction runs only on a passed attempt, after assertions.
        if passed {
            result.extracted_variables =
                extract_variables(&test_case.extract_variables, &view, ctx);
        }

        result.response = Some(read);
        AttemptOutcome::Finished
    }
}

/// The assertion list actually evaluated: explicit assertions, or a
/// synthesized status-code check from the expected response, or nothing
/// (which passes).
fn effective_assertions(test_case: &TestCase) -> Vec<Assertion> {
    if !test_case.assertions.is_empty() {
        return test_case.assertions.clone();
    }
    if let Some(expected) = &test_case.expected_response {
        if let Some(status_code) = expected.status_code {
            return vec![Assertion::status_code_equals(status_code)];
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExpectedResponse;

    #[test]
    fn test_effective_assertions_prefers_explicit_list() {
        let tc = TestCase {
            assertions: vec![Assertion::status_code_equals(201)],
            expected_response: Some(ExpectedResponse {
                status_code: Some(404),
            }),
            ..TestCase::default()
        };
        let effective = effective_assertions(&tc);
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].expected_value, serde_json::json!(201));
    }

    #[test]
    fn test_effective_assertions_synthesized_from_expected_response() {
        let tc = TestCase {
            expected_response: Some(ExpectedResponse {
                status_code: Some(204),
            }),
            ..TestCase::default()
        };
        let effective = effective_assertions(&tc);
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].expected_value, serde_json::json!(204));
    }

    #[test]
    fn test_effective_assertions_empty_when_nothing_declared() {
        let tc = TestCase::default();
        assert!(effective_assertions(&tc).is_empty());
    }
}
