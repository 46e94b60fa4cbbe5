//! Dependency-aware scheduling.
//!
//! Tests form a DAG: prerequisite → dependent. Kahn's algorithm emits
//! layers of simultaneously runnable tests; nodes that never reach
//! in-degree zero are cycle members and get a terminal blocked layer.
//! No recursion anywhere, so a pathological suite cannot blow the stack.

use crate::models::{TestCase, TestCaseResult, TestStatus};
use crate::variables::VariableContext;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

pub const BLOCKED_CYCLE_MESSAGE: &str = "circular dependency or missing prerequisite";

/// The layered schedule: indices into the input slice.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScheduledLayers {
    /// Each layer lists tests whose prerequisites all live in earlier
    /// layers, in input order.
    pub layers: Vec<Vec<usize>>,
    /// Cycle members, in input order. Reported blocked, never executed.
    pub unschedulable: Vec<usize>,
}

/// Layer the tests with Kahn's algorithm.
///
/// Edges to unknown ids and self-edges are dropped with a warning; the
/// affected test still runs.
pub fn build_layers(test_cases: &[TestCase]) -> ScheduledLayers {
    let id_to_index: HashMap<&str, usize> = test_cases
        .iter()
        .enumerate()
        .map(|(i, tc)| (tc.test_case_id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; test_cases.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); test_cases.len()];

    for (index, test_case) in test_cases.iter().enumerate() {
        for prereq in &test_case.prerequisites {
            match id_to_index.get(prereq.as_str()) {
                Some(&prereq_index) if prereq_index == index => {
                    log::warn!(
                        "Test '{}' lists itself as a prerequisite, ignoring",
                        test_case.test_case_id
                    );
                }
                Some(&prereq_index) => {
                    dependents[prereq_index].push(index);
                    in_degree[index] += 1;
                }
                None => {
                    log::warn!(
                        "Test '{}' references unknown prerequisite '{prereq}', ignoring",
                        test_case.test_case_id
                    );
                }
            }
        }
    }

    let mut layers = Vec::new();
    let mut current: Vec<usize> = (0..test_cases.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut scheduled = 0usize;

    while !current.is_empty() {
        scheduled += current.len();
        let mut next = Vec::new();
        for &index in &current {
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        layers.push(std::mem::replace(&mut current, next));
    }

    let unschedulable: Vec<usize> = if scheduled < test_cases.len() {
        (0..test_cases.len()).filter(|&i| in_degree[i] > 0).collect()
    } else {
        Vec::new()
    };

    if !unschedulable.is_empty() {
        log::warn!(
            "{} test(s) are part of a dependency cycle and will be blocked",
            unschedulable.len()
        );
    }

    ScheduledLayers {
        layers,
        unschedulable,
    }
}

/// Runtime gate decision for one test within its layer.
#[derive(Debug)]
pub enum Gate {
    /// Prerequisites passed; run with this variable context.
    Run(VariableContext),
    /// Test is marked skip; no request is issued.
    Skip,
    /// A prerequisite did not pass.
    Blocked(String),
}

/// Decide whether a test may run, given the terminal results of all
/// earlier layers, and assemble its variable context if so.
///
/// Context precedence (low → high): globals, then each prerequisite's
/// extractions in declaration order, then the test's own variables.
pub fn gate_test(
    test_case: &TestCase,
    globals: &IndexMap<String, Value>,
    completed: &HashMap<String, TestCaseResult>,
) -> Gate {
    if test_case.skip {
        return Gate::Skip;
    }

    for prereq in &test_case.prerequisites {
        if let Some(result) = completed.get(prereq.as_str()) {
            if result.status != TestStatus::Passed {
                return Gate::Blocked(format!(
                    "prerequisite '{prereq}' did not pass (status: {:?})",
                    result.status
                ));
            }
        }
    }

    let mut ctx: VariableContext = globals.clone();
    for prereq in &test_case.prerequisites {
        if let Some(result) = completed.get(prereq.as_str()) {
            for (name, value) in &result.extracted_variables {
                ctx.insert(name.clone(), value.clone());
            }
        }
    }
    for (name, value) in &test_case.variables {
        ctx.insert(name.clone(), value.clone());
    }

    Gate::Run(ctx)
}
