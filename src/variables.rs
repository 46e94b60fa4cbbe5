//! Variable substitution: expands `{{name}}` tokens against a context.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// The effective variable mapping for one test: globals, overlaid with
/// prerequisite extractions in declaration order, overlaid with the
/// test's own variables. Built once per test; never shared mutably.
pub type VariableContext = IndexMap<String, Value>;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid token pattern"))
}

/// Replace each `{{key}}` token with the string form of `ctx[key]`.
///
/// Unknown keys expand to the empty string with a warning; a missing
/// variable never fails the request. Expansion is a single pass over the
/// input, so a value that itself contains `{{x}}` stays literal.
pub fn expand(template: &str, ctx: &VariableContext) -> String {
    if template.is_empty() {
        return String::new();
    }

    token_regex()
        .replace_all(template, |caps: &regex::Captures| {
            let key = caps[1].trim();
            match ctx.get(key) {
                Some(value) => value_to_string(value),
                None => {
                    log::warn!("Variable '{key}' not found in context, substituting empty string");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// String form of a variable value: scalars render bare, null renders
/// empty, containers render as canonical JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
