//! Test case extraction from raw LLM output.
//!
//! The model boundary is treated as untrusted parser input: fence
//! stripping, balanced-JSON trimming, comment/trailing-comma cleanup,
//! then progressively coarser fallbacks. Extraction never fails; the
//! worst outcome is an empty list.

use crate::models::TestCase;

/// Parse arbitrary LLM text into a validated list of test cases.
pub fn extract_test_cases(text: &str) -> Vec<TestCase> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let cleaned = strip_code_fences(text);

    // First: the leading balanced JSON value, parsed leniently.
    if let Some(candidate) = first_balanced_json(&cleaned) {
        if let Some(cases) = parse_test_case_array(candidate) {
            let valid = validate(cases);
            if !valid.is_empty() {
                return valid;
            }
        } else if let Some(case) = parse_single_test_case(candidate) {
            let valid = validate(vec![case]);
            if !valid.is_empty() {
                return valid;
            }
        }
    }

    // Second: any balanced array anywhere in the text.
    for candidate in scan_balanced(&cleaned, '[', ']') {
        if let Some(cases) = parse_test_case_array(candidate) {
            if !cases.is_empty() {
                return validate(cases);
            }
        }
    }

    // Last resort: individual objects, keeping whichever validate.
    let mut recovered = Vec::new();
    for candidate in scan_balanced(&cleaned, '{', '}') {
        if let Some(case) = parse_single_test_case(candidate) {
            if case.is_valid() {
                recovered.push(case);
            }
        }
    }
    if recovered.is_empty() {
        log::warn!("No test cases could be extracted from LLM output ({} chars)", text.len());
    }
    recovered
}

fn validate(cases: Vec<TestCase>) -> Vec<TestCase> {
    let total = cases.len();
    let valid: Vec<TestCase> = cases.into_iter().filter(|c| c.is_valid()).collect();
    if valid.len() < total {
        log::warn!(
            "Discarded {} invalid test case(s) out of {total}",
            total - valid.len()
        );
    }
    valid
}

fn parse_test_case_array(text: &str) -> Option<Vec<TestCase>> {
    let sanitized = sanitize_lenient(text);
    serde_json::from_str(&sanitized).ok()
}

fn parse_single_test_case(text: &str) -> Option<TestCase> {
    let sanitized = sanitize_lenient(text);
    serde_json::from_str(&sanitized).ok()
}

/// Drop markdown fence lines (```json, ```) wherever they appear.
fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first balanced top-level JSON value (object or array), found by
/// bracket counting that respects string literals and escapes.
fn first_balanced_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    balanced_region(text, start)
}

/// All balanced regions opened by `open`, non-overlapping, left to right.
fn scan_balanced(text: &str, open: char, close: char) -> Vec<&str> {
    let mut regions = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        match balanced_region(text, start) {
            Some(region) if region.starts_with(open) && region.ends_with(close) => {
                regions.push(region);
                search_from = start + region.len();
            }
            _ => search_from = start + open.len_utf8(),
        }
    }
    regions
}

/// The balanced JSON region starting at `start` (which must index an
/// opening bracket), or `None` when the text ends before it closes.
fn balanced_region(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Make near-JSON parseable: strip `//` and `/* */` comments outside
/// strings and remove trailing commas before a closing bracket.
fn sanitize_lenient(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;
    let mut escaped = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push('"');
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            ',' => {
                // Trailing comma: dropped when the next significant
                // character closes a container.
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    i += 1;
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    const VALID_ARRAY: &str = r#"[
        {
            "testCaseId": "tc-1",
            "testCaseName": "list users",
            "request": {"method": "GET", "path": "/users"}
        },
        {
            "testCaseId": "tc-2",
            "testCaseName": "create user",
            "request": {"method": "POST", "path": "/users", "body": {"name": "x"}}
        }
    ]"#;

    #[test]
    fn test_plain_json_array() {
        let cases = extract_test_cases(VALID_ARRAY);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].test_case_id, "tc-1");
        assert_eq!(
            cases[1].request.as_ref().unwrap().method,
            HttpMethod::Post
        );
    }

    #[test]
    fn test_fenced_json_array() {
        let text = format!("Here are your tests:\n```json\n{VALID_ARRAY}\n```\nEnjoy!");
        let cases = extract_test_cases(&text);
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_prose_before_and_after() {
        let text = format!("Sure! I generated the following cases.\n\n{VALID_ARRAY}\n\nLet me know.");
        let cases = extract_test_cases(&text);
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_pascal_case_fields() {
        let text = r#"[{"TestCaseId": "t", "TestCaseName": "n", "Request": {"Method": "GET", "Path": "/x"}}]"#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].request.as_ref().unwrap().path, "/x");
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let text = r#"[
            {
                // primary happy path
                "testCaseId": "tc-1",
                "testCaseName": "health", /* simple */
                "request": {"method": "GET", "path": "/health",},
            },
        ]"#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 1);
    }

    #[test]
    fn test_array_wrapped_in_object() {
        let text = format!(r#"{{"testCases": {VALID_ARRAY}}}"#);
        let cases = extract_test_cases(&text);
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_invalid_entries_are_discarded() {
        let text = r#"[
            {"testCaseId": "", "testCaseName": "no id", "request": {"method": "GET", "path": "/a"}},
            {"testCaseId": "ok", "testCaseName": "fine", "request": {"method": "GET", "path": "/b"}},
            {"testCaseId": "no-request", "testCaseName": "bad"}
        ]"#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].test_case_id, "ok");
    }

    #[test]
    fn test_single_object_is_recovered() {
        let text = r#"The only case:
            {"testCaseId": "solo", "testCaseName": "solo", "request": {"method": "GET", "path": "/solo"}}"#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].test_case_id, "solo");
    }

    #[test]
    fn test_individual_objects_fallback() {
        // Broken outer array: the per-object scan still recovers both.
        let text = r#"[
            {"testCaseId": "a", "testCaseName": "a", "request": {"method": "GET", "path": "/a"}}
            {"testCaseId": "b", "testCaseName": "b", "request": {"method": "GET", "path": "/b"}}
        "#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_garbage_yields_empty_list() {
        assert!(extract_test_cases("I could not generate anything, sorry.").is_empty());
        assert!(extract_test_cases("").is_empty());
        assert!(extract_test_cases("{{{{").is_empty());
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_the_scanner() {
        let text = r#"[{"testCaseId": "s", "testCaseName": "tricky {\"nested\"}", "request": {"method": "GET", "path": "/x?q={{var}}"}}]"#;
        let cases = extract_test_cases(text);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].test_case_name, r#"tricky {"nested"}"#);
    }

    #[test]
    fn test_balanced_region_unterminated() {
        assert_eq!(balanced_region(r#"{"a": 1"#, 0), None);
    }

    #[test]
    fn test_sanitize_keeps_urls_in_strings() {
        let text = r#"{"url": "http://x//y"}"#;
        assert_eq!(sanitize_lenient(text), text);
    }
}
