//! Dot/bracket path lookups over JSON data.
//!
//! A path is a list of dot-separated segments. Each segment is a mapping key, optionally followed by a
//! single `[N]` index applied to the value found under that key. A bare `[N]` segment indexes the
//! current sequence directly. Lookups are total: anything that does not resolve yields `Value::Null`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static INDEXED_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)\[(\d+)\]$").expect("valid segment pattern"));

/// Resolves `path` against `data`. A blank path returns `data` unchanged.
pub fn extract(
    data: &Value,
    path: &str,
) -> Value {
    if path.trim().is_empty() {
        return data.clone();
    }
    lookup(data, path).cloned().unwrap_or(Value::Null)
}

fn lookup<'a>(
    data: &'a Value,
    path: &str,
) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match INDEXED_SEGMENT.captures(segment) {
            Some(caps) => {
                let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let index: usize = caps[2].parse().ok()?;
                let container = if key.is_empty() {
                    current
                } else {
                    current.as_object()?.get(key)?
                };
                container.as_array()?.get(index)?
            }
            None => current.as_object()?.get(segment)?,
        };
    }
    Some(current)
}
