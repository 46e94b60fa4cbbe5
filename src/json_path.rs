//! JSON selection over a dotted/indexed path, a small JSONPath subset.
//!
//! Grammar: optional leading `$` or `$.`, segments separated by `.`,
//! each segment a property name optionally followed by `[i]` indices.
//! Navigation is strict: any miss or type mismatch yields `None`.

use serde_json::Value;

/// One parsed step of a path.
#[derive(Debug, Clone, PartialEq)]
enum PathPart {
    Property(String),
    Index(usize),
}

/// Resolve `path` against `root`, returning the selected node or `None`.
///
/// `$` alone and the empty path both return the root.
pub fn select<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = normalize(path);
    if trimmed.is_empty() {
        return Some(root);
    }

    let parts = parse_path(trimmed)?;
    let mut current = root;
    for part in parts {
        match part {
            PathPart::Property(key) => match current {
                Value::Object(obj) => current = obj.get(&key)?,
                _ => return None,
            },
            PathPart::Index(index) => match current {
                Value::Array(arr) => current = arr.get(index)?,
                _ => return None,
            },
        }
    }
    Some(current)
}

/// Primitive form of a node: scalars come back as themselves, containers
/// as their canonical JSON-text serialization.
pub fn node_value(node: &Value) -> Value {
    match node {
        Value::Object(_) | Value::Array(_) => Value::String(node.to_string()),
        scalar => scalar.clone(),
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim();
    if trimmed == "$" {
        return "";
    }
    trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed)
}

fn parse_path(path: &str) -> Option<Vec<PathPart>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    parts.push(PathPart::Property(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    parts.push(PathPart::Property(std::mem::take(&mut current)));
                }

                let mut index_str = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == ']' {
                        closed = true;
                        break;
                    }
                    index_str.push(ch);
                }
                if !closed {
                    return None;
                }
                parts.push(PathPart::Index(index_str.trim().parse().ok()?));
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(PathPart::Property(current));
    }

    Some(parts)
}
