//! Variable extraction from responses.
//!
//! Rules run once per passed test, after assertion evaluation. Extracted
//! values flow to dependents through the test's result, never through a
//! shared registry.

use crate::assertions::ResponseView;
use crate::json_path::{node_value, select};
use crate::models::{ExtractionSource, VariableExtractionRule};
use crate::variables::{value_to_string, VariableContext};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

/// Apply the ordered rules against a response, producing name → value.
pub fn extract_variables(
    rules: &[VariableExtractionRule],
    response: &ResponseView<'_>,
    _ctx: &VariableContext,
) -> IndexMap<String, Value> {
    let mut extracted = IndexMap::new();
    if rules.is_empty() {
        return extracted;
    }

    let body_json = response.body_json();

    for rule in rules {
        let raw = resolve_source(rule, response, body_json.as_ref());
        let value = apply_regex(rule, raw);
        log::debug!(
            "Extracted variable '{}' = {}",
            rule.name,
            value_to_string(&value)
        );
        extracted.insert(rule.name.clone(), value);
    }

    extracted
}

/// Resolve the raw value named by the rule's source.
fn resolve_source(
    rule: &VariableExtractionRule,
    response: &ResponseView<'_>,
    body_json: Option<&Value>,
) -> Value {
    match rule.source {
        ExtractionSource::ResponseBody => match body_json {
            Some(root) => match select(root, &rule.path) {
                Some(node) => node_value(node),
                None => {
                    log::warn!(
                        "Extraction rule '{}': JSON path '{}' not found",
                        rule.name,
                        rule.path
                    );
                    Value::Null
                }
            },
            // Non-JSON body: fall back to the raw text.
            None => Value::String(response.body.to_string()),
        },
        ExtractionSource::ResponseHeader => match response.header(&rule.path) {
            Some(value) => Value::String(value.to_string()),
            None => {
                log::warn!(
                    "Extraction rule '{}': header '{}' not present",
                    rule.name,
                    rule.path
                );
                Value::Null
            }
        },
        ExtractionSource::ResponseStatusCode => Value::from(response.status_code),
    }
}

/// Refine the raw value through the rule's regex, when one is given.
/// Capture group 1 wins; a pattern without groups keeps the whole match.
fn apply_regex(rule: &VariableExtractionRule, raw: Value) -> Value {
    let Some(pattern) = rule.regex.as_deref() else {
        return raw;
    };

    let regex = match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => {
            log::warn!(
                "Extraction rule '{}': invalid regex '{pattern}': {e}",
                rule.name
            );
            return Value::Null;
        }
    };

    let haystack = value_to_string(&raw);
    match regex.captures(&haystack) {
        Some(caps) => {
            let matched = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Value::String(matched)
        }
        None => {
            log::warn!(
                "Extraction rule '{}': regex '{pattern}' did not match '{haystack}'",
                rule.name
            );
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> IndexMap<String, String> {
        let mut h = IndexMap::new();
        h.insert("location".to_string(), "/users/42".to_string());
        h.insert("set-cookie".to_string(), "a=1,b=2".to_string());
        h
    }

    fn view<'a>(headers: &'a IndexMap<String, String>, body: &'a str) -> ResponseView<'a> {
        ResponseView {
            status_code: 201,
            headers,
            body,
            duration_ms: 10,
        }
    }

    fn rule(name: &str, source: ExtractionSource, path: &str) -> VariableExtractionRule {
        VariableExtractionRule {
            name: name.to_string(),
            source,
            path: path.to_string(),
            regex: None,
        }
    }

    #[test]
    fn test_extract_from_body_json_path() {
        let h = headers();
        let v = view(&h, r#"{"auth": {"token": "abc123"}}"#);
        let rules = vec![rule("token", ExtractionSource::ResponseBody, "auth.token")];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        assert_eq!(out.get("token"), Some(&json!("abc123")));
    }

    #[test]
    fn test_extract_from_non_json_body_falls_back_to_raw() {
        let h = headers();
        let v = view(&h, "plain token text");
        let rules = vec![rule("raw", ExtractionSource::ResponseBody, "anything")];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        assert_eq!(out.get("raw"), Some(&json!("plain token text")));
    }

    #[test]
    fn test_extract_missing_path_is_null() {
        let h = headers();
        let v = view(&h, r#"{"a": 1}"#);
        let rules = vec![rule("x", ExtractionSource::ResponseBody, "b.c")];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        assert_eq!(out.get("x"), Some(&Value::Null));
    }

    #[test]
    fn test_extract_from_header() {
        let h = headers();
        let v = view(&h, "{}");
        let rules = vec![rule("loc", ExtractionSource::ResponseHeader, "Location")];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        assert_eq!(out.get("loc"), Some(&json!("/users/42")));
    }

    #[test]
    fn test_extract_status_code() {
        let h = headers();
        let v = view(&h, "{}");
        let rules = vec![rule("code", ExtractionSource::ResponseStatusCode, "")];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        assert_eq!(out.get("code"), Some(&json!(201)));
    }

    #[test]
    fn test_regex_capture_group() {
        let h = headers();
        let v = view(&h, "{}");
        let mut r = rule("id", ExtractionSource::ResponseHeader, "location");
        r.regex = Some(r"/users/(\d+)".to_string());
        let out = extract_variables(&[r], &v, &VariableContext::new());
        assert_eq!(out.get("id"), Some(&json!("42")));
    }

    #[test]
    fn test_regex_without_group_keeps_whole_match() {
        let h = headers();
        let v = view(&h, r#"{"msg": "order ABC-77 created"}"#);
        let mut r = rule("order", ExtractionSource::ResponseBody, "msg");
        r.regex = Some(r"ABC-\d+".to_string());
        let out = extract_variables(&[r], &v, &VariableContext::new());
        assert_eq!(out.get("order"), Some(&json!("ABC-77")));
    }

    #[test]
    fn test_regex_no_match_is_null() {
        let h = headers();
        let v = view(&h, r#"{"msg": "nothing here"}"#);
        let mut r = rule("order", ExtractionSource::ResponseBody, "msg");
        r.regex = Some(r"XYZ-\d+".to_string());
        let out = extract_variables(&[r], &v, &VariableContext::new());
        assert_eq!(out.get("order"), Some(&Value::Null));
    }

    #[test]
    fn test_rules_keep_declaration_order() {
        let h = headers();
        let v = view(&h, r#"{"a": 1, "b": 2}"#);
        let rules = vec![
            rule("second", ExtractionSource::ResponseBody, "b"),
            rule("first", ExtractionSource::ResponseBody, "a"),
        ];
        let out = extract_variables(&rules, &v, &VariableContext::new());
        let names: Vec<&str> = out.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }
}
