use serde_json::{Map, Value};

use crate::Result;

/// Parses csv text with a header row into one mapping per data row.
///
/// Values are trimmed. A value starting with `{` or `[` is parsed as JSON when it is valid JSON.
pub fn parse_rows(csv_text: &str) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).flexible(true).trim(csv::Trim::All).from_reader(csv_text.trim().as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers.iter().zip(record.iter()).map(|(key, value)| (key.to_string(), cell_value(value))).collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell_value(text: &str) -> Value {
    if text.starts_with('{') || text.starts_with('[') {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
    }
    Value::String(text.to_string())
}
