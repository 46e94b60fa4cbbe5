//! Assertion evaluation against an HTTP response.
//!
//! Each assertion is a (type, target, condition, expected) tuple applied
//! to the response view. Evaluation never panics and never propagates an
//! error: every failure path lands in an `AssertionResult` with
//! `passed = false` and a message.

use crate::json_path::{node_value, select};
use crate::models::{Assertion, AssertionCondition, AssertionResult, AssertionType};
use crate::variables::{self, VariableContext};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

/// Read-only view of the received response handed to the evaluator.
#[derive(Debug, Clone)]
pub struct ResponseView<'a> {
    pub status_code: u16,
    /// Response headers merged with content headers, multi-values already
    /// joined with ",".
    pub headers: &'a IndexMap<String, String>,
    pub body: &'a str,
    pub duration_ms: u64,
}

impl<'a> ResponseView<'a> {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON; only `{…}` and `[…]` bodies qualify.
    pub fn body_json(&self) -> Option<Value> {
        let trimmed = self.body.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }
        serde_json::from_str(self.body).ok()
    }
}

/// Evaluate every assertion of a test against the response.
pub fn evaluate_all(
    assertions: &[Assertion],
    response: &ResponseView<'_>,
    ctx: &VariableContext,
) -> Vec<AssertionResult> {
    assertions
        .iter()
        .map(|a| evaluate(a, response, ctx))
        .collect()
}

/// Evaluate one assertion. Infallible by contract.
pub fn evaluate(
    assertion: &Assertion,
    response: &ResponseView<'_>,
    ctx: &VariableContext,
) -> AssertionResult {
    // Expand variables in a string-typed expected value before comparing.
    let expected = match &assertion.expected_value {
        Value::String(s) => Value::String(variables::expand(s, ctx)),
        other => other.clone(),
    };

    let outcome = apply(assertion, &expected, response, ctx);

    log::debug!(
        "Assertion {:?} {} {:?}: {}",
        assertion.assertion_type,
        assertion.condition,
        assertion.target,
        match &outcome {
            Ok((passed, _)) => {
                if *passed {
                    "passed".to_string()
                } else {
                    "failed".to_string()
                }
            }
            Err(msg) => format!("errored: {msg}"),
        }
    );

    match outcome {
        Ok((true, actual)) => AssertionResult {
            assertion_type: assertion.assertion_type,
            target: assertion.target.clone(),
            condition: assertion.condition,
            expected_value: expected,
            passed: true,
            actual_value: actual,
            message: None,
        },
        Ok((false, actual)) => {
            let message = failure_message(&expected, assertion.condition, actual.as_ref());
            AssertionResult {
                assertion_type: assertion.assertion_type,
                target: assertion.target.clone(),
                condition: assertion.condition,
                expected_value: expected,
                passed: false,
                actual_value: actual,
                message: Some(message),
            }
        }
        Err(message) => AssertionResult {
            assertion_type: assertion.assertion_type,
            target: assertion.target.clone(),
            condition: assertion.condition,
            expected_value: expected,
            passed: false,
            actual_value: None,
            message: Some(message),
        },
    }
}

fn failure_message(
    expected: &Value,
    condition: AssertionCondition,
    actual: Option<&Value>,
) -> String {
    let actual_text = actual
        .map(variables::value_to_string)
        .unwrap_or_else(|| "<absent>".to_string());
    format!(
        "Assertion failed. Expected: {} ({condition}), Actual: {actual_text}",
        variables::value_to_string(expected)
    )
}

/// Dispatch table over assertion types. Returns (passed, observed value)
/// or an evaluation-level failure message.
fn apply(
    assertion: &Assertion,
    expected: &Value,
    response: &ResponseView<'_>,
    _ctx: &VariableContext,
) -> Result<(bool, Option<Value>), String> {
    match assertion.assertion_type {
        AssertionType::StatusCode => {
            let actual = Value::from(response.status_code);
            let passed = check_condition(&actual, expected, assertion.condition)?;
            Ok((passed, Some(actual)))
        }
        AssertionType::ResponseTime => {
            let actual = Value::from(response.duration_ms);
            let passed = check_condition(&actual, expected, assertion.condition)?;
            Ok((passed, Some(actual)))
        }
        AssertionType::HeaderExists => {
            let present = response.header(&assertion.target).is_some();
            let passed = match assertion.condition {
                AssertionCondition::NotExists => !present,
                AssertionCondition::Exists => present,
                _ => check_condition(&Value::Bool(present), expected, assertion.condition)?,
            };
            Ok((passed, Some(Value::Bool(present))))
        }
        AssertionType::HeaderValue => {
            let actual = Value::String(
                response
                    .header(&assertion.target)
                    .unwrap_or_default()
                    .to_string(),
            );
            let passed = check_condition(&actual, expected, assertion.condition)?;
            Ok((passed, Some(actual)))
        }
        AssertionType::BodyContainsString => {
            let needle = variables::value_to_string(expected);
            let contains = response.body.contains(&needle);
            let passed = match assertion.condition {
                AssertionCondition::NotContains | AssertionCondition::NotEquals => !contains,
                _ => contains,
            };
            Ok((passed, Some(Value::String(preview(response.body)))))
        }
        AssertionType::BodyEqualsString => {
            let expected_text = variables::value_to_string(expected);
            let equals = response.body == expected_text;
            let passed = match assertion.condition {
                AssertionCondition::NotEquals => !equals,
                _ => equals,
            };
            Ok((passed, Some(Value::String(preview(response.body)))))
        }
        AssertionType::BodyMatchesRegex => {
            let pattern = variables::value_to_string(expected);
            let regex =
                Regex::new(&pattern).map_err(|e| format!("Invalid regex '{pattern}': {e}"))?;
            let matched = regex.is_match(response.body);
            let passed = match assertion.condition {
                AssertionCondition::NotMatchesRegex => !matched,
                _ => matched,
            };
            Ok((passed, Some(Value::String(preview(response.body)))))
        }
        AssertionType::JsonPathValue => {
            let root = response
                .body_json()
                .ok_or_else(|| "response body is not valid JSON".to_string())?;
            match select(&root, &assertion.target) {
                Some(node) => {
                    let actual = node_value(node);
                    let passed = check_condition(&actual, expected, assertion.condition)?;
                    Ok((passed, Some(actual)))
                }
                None => Err("JSON Path not found".to_string()),
            }
        }
        AssertionType::JsonPathExists => {
            let root = response
                .body_json()
                .ok_or_else(|| "response body is not valid JSON".to_string())?;
            let present = select(&root, &assertion.target).is_some();
            Ok((present, Some(Value::Bool(present))))
        }
        AssertionType::JsonPathNotExists => {
            let root = response
                .body_json()
                .ok_or_else(|| "response body is not valid JSON".to_string())?;
            let present = select(&root, &assertion.target).is_some();
            Ok((!present, Some(Value::Bool(present))))
        }
        AssertionType::ArrayLength => {
            let root = response
                .body_json()
                .ok_or_else(|| "response body is not valid JSON".to_string())?;
            let node = select(&root, &assertion.target)
                .ok_or_else(|| "JSON Path not found".to_string())?;
            let arr = node
                .as_array()
                .ok_or_else(|| format!("'{}' is not an array", display_target(assertion)))?;
            let actual = Value::from(arr.len());
            let passed = check_condition(&actual, expected, assertion.condition)?;
            Ok((passed, Some(actual)))
        }
        AssertionType::ArrayContains => {
            let root = response
                .body_json()
                .ok_or_else(|| "response body is not valid JSON".to_string())?;
            let node = select(&root, &assertion.target)
                .ok_or_else(|| "JSON Path not found".to_string())?;
            let arr = node
                .as_array()
                .ok_or_else(|| format!("'{}' is not an array", display_target(assertion)))?;
            let contains = arr
                .iter()
                .any(|element| typed_equals(&node_value(element), expected));
            let passed = match assertion.condition {
                AssertionCondition::NotContains | AssertionCondition::NotEquals => !contains,
                _ => contains,
            };
            Ok((passed, Some(Value::from(arr.len()))))
        }
        AssertionType::JsonSchemaValidation => {
            Err("JSON schema validation is not supported".to_string())
        }
        AssertionType::XmlPathValue | AssertionType::XmlSchemaValidation => {
            Err("XML assertions are not supported".to_string())
        }
    }
}

fn display_target(assertion: &Assertion) -> &str {
    if assertion.target.is_empty() {
        "$"
    } else {
        &assertion.target
    }
}

fn preview(body: &str) -> String {
    const PREVIEW_LEN: usize = 256;
    if body.len() <= PREVIEW_LEN {
        body.to_string()
    } else {
        let mut end = PREVIEW_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

/// Generic condition check over an observed and an expected value.
fn check_condition(
    actual: &Value,
    expected: &Value,
    condition: AssertionCondition,
) -> Result<bool, String> {
    match condition {
        AssertionCondition::Equals => Ok(typed_equals(actual, expected)),
        AssertionCondition::NotEquals => Ok(!typed_equals(actual, expected)),
        AssertionCondition::GreaterThan => numeric_compare(actual, expected, |a, b| a > b),
        AssertionCondition::GreaterThanOrEqual => numeric_compare(actual, expected, |a, b| a >= b),
        AssertionCondition::LessThan => numeric_compare(actual, expected, |a, b| a < b),
        AssertionCondition::LessThanOrEqual => numeric_compare(actual, expected, |a, b| a <= b),
        AssertionCondition::Contains => Ok(string_form(actual).contains(&string_form(expected))),
        AssertionCondition::NotContains => {
            Ok(!string_form(actual).contains(&string_form(expected)))
        }
        AssertionCondition::MatchesRegex => regex_match(actual, expected),
        AssertionCondition::NotMatchesRegex => regex_match(actual, expected).map(|m| !m),
        AssertionCondition::Exists => Ok(!actual.is_null()),
        AssertionCondition::NotExists => Ok(actual.is_null()),
        AssertionCondition::IsNull => Ok(actual.is_null()),
        AssertionCondition::IsNotNull => Ok(!actual.is_null()),
        AssertionCondition::IsEmpty => Ok(is_empty(actual)),
        AssertionCondition::IsNotEmpty => Ok(!is_empty(actual)),
        AssertionCondition::IsValid => {
            Err("IsValid applies only to schema validation assertions".to_string())
        }
    }
}

/// Equality with coercion of the expected value to the observed kind.
/// Numbers compare numerically, booleans parse from strings, everything
/// else compares as ordinal case-sensitive strings.
fn typed_equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Number(n) => {
            if let (Some(a), Some(b)) = (n.as_i64(), value_as_i64(expected)) {
                return a == b;
            }
            match (n.as_f64(), value_as_f64(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        Value::Bool(a) => match expected {
            Value::Bool(b) => a == b,
            Value::String(s) => s.trim().parse::<bool>().map(|b| *a == b).unwrap_or(false),
            _ => false,
        },
        Value::Null => expected.is_null(),
        _ => string_form(actual) == string_form(expected),
    }
}

fn numeric_compare<F>(actual: &Value, expected: &Value, op: F) -> Result<bool, String>
where
    F: Fn(f64, f64) -> bool,
{
    let a = value_as_f64(actual)
        .ok_or_else(|| format!("Cannot compare non-numeric value '{}'", string_form(actual)))?;
    let b = value_as_f64(expected).ok_or_else(|| {
        format!(
            "Cannot parse expected value '{}' as number",
            string_form(expected)
        )
    })?;
    Ok(op(a, b))
}

fn regex_match(actual: &Value, expected: &Value) -> Result<bool, String> {
    let pattern = string_form(expected);
    let regex = Regex::new(&pattern).map_err(|e| format!("Invalid regex '{pattern}': {e}"))?;
    Ok(regex.is_match(&string_form(actual)))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn string_form(value: &Value) -> String {
    crate::variables::value_to_string(value)
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
