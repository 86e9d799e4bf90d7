use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{
    Result,
    extract::extract,
    request::{CallResult, ResolvedRequest},
    store::data::SaveField,
};

/// Keeps alphanumerics, `-`, `_` and `.`. Falls back to `output` when nothing survives.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.')).collect();
    if cleaned.is_empty() { "output".to_string() } else { cleaned }
}

/// `<output_name>.json` when the row names its output, else `<template>_<stamp>_<seq>.json`.
pub fn artifact_name(
    output_name: Option<&Value>,
    template_name: &str,
    stamp: &str,
    seq: u32,
) -> String {
    let explicit = output_name.and_then(|v| match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });
    match explicit {
        Some(name) => format!("{}.json", sanitize_filename(&name)),
        None => format!("{}_{}_{}.json", template_name, stamp, seq),
    }
}

/// The artifact body: the `result_path` subset of the response when set, else the selected fields.
pub fn payload(
    result: &CallResult,
    request: &ResolvedRequest,
    result_path: Option<&str>,
    fields: &[SaveField],
) -> Value {
    if let Some(path) = result_path.filter(|p| !p.trim().is_empty()) {
        let base = match &result.data {
            Some(data @ (Value::Object(_) | Value::Array(_))) => Some(data),
            _ => result.raw_response.as_ref(),
        };
        return base.map(|b| extract(b, path)).unwrap_or(Value::Null);
    }

    let mut payload = Map::new();
    for field in fields {
        let value = match field {
            SaveField::Success => Value::Bool(result.success),
            SaveField::Error => result.error.clone().map(Value::String).unwrap_or(Value::Null),
            SaveField::Data => result.data.clone().unwrap_or(Value::Null),
            SaveField::RawResponse => result.raw_response.clone().unwrap_or(Value::Null),
            SaveField::Request => request.echo(),
        };
        payload.insert(field.as_ref().to_string(), value);
    }
    Value::Object(payload)
}

/// Writes `payload` as pretty UTF-8 JSON under `dir`.
pub fn write(
    dir: &Path,
    name: &str,
    payload: &Value,
) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(payload)?)?;
    Ok(path)
}
