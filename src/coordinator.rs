//! Run coordination: owns the run state, drives the scheduler layer by
//! layer, fans tests out to a bounded worker pool, and aggregates the
//! ordered results.
//!
//! The coordinator never fails toward its caller: fatal setup faults
//! (an empty base URL) surface as per-test Error results.

use crate::cancel::RunCancellation;
use crate::http_client::HttpClientPool;
use crate::models::{TestCase, TestCaseResult, TestRunResult, TestStatus};
use crate::request_builder::normalize_base_url;
use crate::runner::TestRunner;
use crate::scheduler::{self, Gate, ScheduledLayers, BLOCKED_CYCLE_MESSAGE};
use crate::settings::ExecutionSettings;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Seed state for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub test_cases: Vec<TestCase>,
    pub base_url: String,
    pub global_headers: IndexMap<String, String>,
    pub global_variables: IndexMap<String, Value>,
}

pub struct TestRunCoordinator {
    settings: ExecutionSettings,
}

impl TestRunCoordinator {
    pub fn new(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    /// Execute a full run. Infallible: every input test case yields
    /// exactly one result in the returned report.
    pub async fn execute(&self, request: RunRequest, cancel: RunCancellation) -> TestRunResult {
        let run_id = Uuid::new_v4().to_string();
        let start_time = Utc::now();
        let total_tests = request.test_cases.len();

        log::info!(
            "Starting test run {run_id}: {total_tests} test(s) against '{}'",
            request.base_url
        );

        if request.base_url.trim().is_empty() {
            let results = request
                .test_cases
                .iter()
                .map(|tc| TestCaseResult::terminal(tc, TestStatus::Error, "base URL is empty"))
                .collect();
            return TestRunResult {
                run_id,
                start_time,
                end_time: Utc::now(),
                base_url: request.base_url,
                total_tests,
                global_variables: request.global_variables,
                test_case_results: results,
            };
        }

        let base_url = normalize_base_url(&request.base_url);

        let pool = match HttpClientPool::new(&self.settings) {
            Ok(pool) => pool,
            Err(e) => {
                let message = format!("failed to build HTTP client: {e}");
                let results = request
                    .test_cases
                    .iter()
                    .map(|tc| TestCaseResult::terminal(tc, TestStatus::Error, message.clone()))
                    .collect();
                return TestRunResult {
                    run_id,
                    start_time,
                    end_time: Utc::now(),
                    base_url,
                    total_tests,
                    global_variables: request.global_variables,
                    test_case_results: results,
                };
            }
        };
        let runner = Arc::new(TestRunner::new(pool, self.settings.clone()));

        let schedule = scheduler::build_layers(&request.test_cases);
        let test_cases = Arc::new(request.test_cases);
        let globals = Arc::new(request.global_variables.clone());
        let global_headers = Arc::new(request.global_headers);
        let base_url = Arc::new(base_url);

        let mut completed: HashMap<String, TestCaseResult> = HashMap::new();
        let mut ordered: Vec<TestCaseResult> = Vec::with_capacity(total_tests);

        for (layer_index, layer) in schedule.layers.iter().enumerate() {
            log::debug!(
                "Run {run_id}: layer {layer_index} with {} test(s)",
                layer.len()
            );
            let layer_results = self
                .execute_layer(
                    layer,
                    &test_cases,
                    &completed,
                    &globals,
                    &global_headers,
                    &base_url,
                    &runner,
                    &cancel,
                )
                .await;

            // Append in the scheduler's emission order, then publish to
            // dependents.
            for &index in layer {
                if let Some(result) = layer_results.get(&test_cases[index].test_case_id) {
                    ordered.push(result.clone());
                }
            }
            completed.extend(layer_results);
        }

        append_unschedulable(&schedule, &test_cases, &mut ordered);

        let run = TestRunResult {
            run_id,
            start_time,
            end_time: Utc::now(),
            base_url: base_url.as_ref().clone(),
            total_tests,
            global_variables: request.global_variables,
            test_case_results: ordered,
        };
        log::info!(
            "Run {} finished: {} passed, {} failed, {} skipped, {} blocked, {} error",
            run.run_id,
            run.tests_passed(),
            run.tests_failed(),
            run.tests_skipped(),
            run.tests_blocked(),
            run.tests_with_error()
        );
        run
    }

    /// Drain one layer through a fixed worker set. The work queue is an
    /// mpsc channel of test indices; workers publish results keyed by
    /// test id. The layer is done when every test has a result.
    #[allow(clippy::too_many_arguments)]
    async fn execute_layer(
        &self,
        layer: &[usize],
        test_cases: &Arc<Vec<TestCase>>,
        completed: &HashMap<String, TestCaseResult>,
        globals: &Arc<IndexMap<String, Value>>,
        global_headers: &Arc<IndexMap<String, String>>,
        base_url: &Arc<String>,
        runner: &Arc<TestRunner>,
        cancel: &RunCancellation,
    ) -> HashMap<String, TestCaseResult> {
        let worker_count = self.settings.max_parallelism.max(1).min(layer.len().max(1));

        let (work_tx, work_rx) = mpsc::channel::<usize>(layer.len().max(1));
        let (result_tx, mut result_rx) = mpsc::channel::<(String, TestCaseResult)>(layer.len().max(1));
        let work_rx = Arc::new(Mutex::new(work_rx));
        let completed = Arc::new(completed.clone());

        for &index in layer {
            // Capacity equals the layer size, so this cannot block.
            let _ = work_tx.send(index).await;
        }
        drop(work_tx);

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let test_cases = Arc::clone(test_cases);
            let completed = Arc::clone(&completed);
            let globals = Arc::clone(globals);
            let global_headers = Arc::clone(global_headers);
            let base_url = Arc::clone(base_url);
            let runner = Arc::clone(runner);
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let index = {
                        let mut rx = work_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(index) = index else { break };
                    let test_case = &test_cases[index];

                    let result = match scheduler::gate_test(test_case, &globals, &completed) {
                        Gate::Skip => {
                            log::info!("Test '{}' is marked skip", test_case.test_case_id);
                            TestCaseResult::terminal(
                                test_case,
                                TestStatus::Skipped,
                                "test case is marked as skipped",
                            )
                        }
                        Gate::Blocked(reason) => {
                            log::warn!("Test '{}' blocked: {reason}", test_case.test_case_id);
                            TestCaseResult::terminal(test_case, TestStatus::Blocked, reason)
                        }
                        Gate::Run(ctx) => {
                            runner
                                .run_test(test_case, &base_url, &global_headers, &ctx, &cancel)
                                .await
                        }
                    };

                    let _ = result_tx
                        .send((test_case.test_case_id.clone(), result))
                        .await;
                }
            }));
        }
        drop(result_tx);

        let mut layer_results = HashMap::with_capacity(layer.len());
        while let Some((id, result)) = result_rx.recv().await {
            layer_results.insert(id, result);
        }
        let _ = futures::future::join_all(workers).await;

        layer_results
    }
}

/// Cycle members become a terminal blocked layer; no requests issued.
fn append_unschedulable(
    schedule: &ScheduledLayers,
    test_cases: &[TestCase],
    ordered: &mut Vec<TestCaseResult>,
) {
    for &index in &schedule.unschedulable {
        let test_case = &test_cases[index];
        log::warn!(
            "Test '{}' blocked: {BLOCKED_CYCLE_MESSAGE}",
            test_case.test_case_id
        );
        ordered.push(TestCaseResult::terminal(
            test_case,
            TestStatus::Blocked,
            BLOCKED_CYCLE_MESSAGE,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(id: &str) -> TestCase {
        TestCase {
            test_case_id: id.to_string(),
            test_case_name: id.to_string(),
            ..TestCase::default()
        }
    }

    #[tokio::test]
    async fn test_empty_base_url_errors_every_test() {
        let coordinator = TestRunCoordinator::new(ExecutionSettings::default());
        let run = coordinator
            .execute(
                RunRequest {
                    test_cases: vec![tc("a"), tc("b")],
                    base_url: "  ".to_string(),
                    ..RunRequest::default()
                },
                RunCancellation::new(),
            )
            .await;
        assert_eq!(run.total_tests, 2);
        assert_eq!(run.tests_with_error(), 2);
        assert!(run
            .test_case_results
            .iter()
            .all(|r| r.error_message.as_deref() == Some("base URL is empty")));
    }

    #[tokio::test]
    async fn test_empty_test_list_yields_empty_run() {
        let coordinator = TestRunCoordinator::new(ExecutionSettings::default());
        let run = coordinator
            .execute(
                RunRequest {
                    base_url: "http://localhost:1/".to_string(),
                    ..RunRequest::default()
                },
                RunCancellation::new(),
            )
            .await;
        assert_eq!(run.total_tests, 0);
        assert!(run.test_case_results.is_empty());
        assert!(!run.run_id.is_empty());
        assert!(run.end_time >= run.start_time);
    }
}
