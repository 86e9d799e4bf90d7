//! Outbound requests: compiling templates into concrete calls and executing them.

mod compiler;
mod executor;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub use compiler::compile;
pub use executor::HttpExecutor;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
}

/// A fully compiled outbound call. Built fresh per call and never persisted as-is.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ResolvedRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub params: Map<String, Value>,
    pub body: Value,
    /// `scheme://ip:port`, used as the only proxy for this call
    pub proxy: Option<String>,
}

impl ResolvedRequest {
    /// True when a `Content-Type` header (any case) selects urlencoded form bodies.
    pub fn is_form(&self) -> bool {
        is_form_content(&self.headers)
    }

    /// The request as it appears in batch artifacts.
    pub fn echo(&self) -> Value {
        json!({
            "url": self.url,
            "method": self.method.as_ref(),
            "headers": self.headers,
            "params": self.params,
            "body": self.body,
            "proxy": self.proxy,
        })
    }
}

/// Uniform outcome of one call: `error` is set iff `success` is false, and `data` is only present on success.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct CallResult {
    pub success: bool,
    pub data: Option<Value>,
    pub raw_response: Option<Value>,
    pub error: Option<String>,
}

impl CallResult {
    /// A null extracted value is reported as absent.
    pub fn success(
        data: Value,
        raw_response: Option<Value>,
    ) -> Self {
        Self {
            success: true,
            data: (!data.is_null()).then_some(data),
            raw_response,
            error: None,
        }
    }

    pub fn failure(
        error: impl Into<String>,
        raw_response: Option<Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            raw_response,
            error: Some(error.into()),
        }
    }

    /// Successful and carrying non-null data.
    pub fn is_accepted(&self) -> bool {
        self.success && self.data.is_some()
    }
}

fn is_form_content(headers: &BTreeMap<String, String>) -> bool {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("content-type")).is_some_and(|(_, v)| v.to_ascii_lowercase().contains(FORM_CONTENT_TYPE))
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flattens a mapping into form pairs. Sequence values repeat their key.
pub(crate) fn form_pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) => pairs.extend(items.iter().map(|item| (key.clone(), form_value(item)))),
            other => pairs.push((key.clone(), form_value(other))),
        }
    }
    pairs
}

/// Serializes a mapping as `application/x-www-form-urlencoded` text.
pub(crate) fn encode_form(map: &Map<String, Value>) -> String {
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form_pairs(map)).finish()
}

/// Parses urlencoded text into a mapping, keeping blank values. A repeated key keeps its last value.
pub(crate) fn decode_form(text: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(text.as_bytes()).map(|(k, v)| (k.into_owned(), Value::String(v.into_owned()))).collect()
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use serde_json::{Map, Value, json};

    use super::{CallResult, decode_form, encode_form, is_form_content};

    #[test]
    fn test_call_result_null_data_is_absent() {
        let result = CallResult::success(Value::Null, Some(json!({"a": 1})));
        assert!(result.success);
        assert_eq!(result.data, None);
        assert!(!result.is_accepted());

        let failed = CallResult::failure("boom", None);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.data, None);
    }

    #[test]
    fn test_form_content_detection_ignores_case() {
        let mut headers = BTreeMap::new();
        headers.insert("content-TYPE".to_string(), "Application/X-WWW-Form-Urlencoded; charset=UTF-8".to_string());
        assert!(is_form_content(&headers));
        headers.insert("content-TYPE".to_string(), "application/json".to_string());
        assert!(!is_form_content(&headers));
    }

    #[test]
    fn test_form_encoding() {
        let mut map = Map::new();
        map.insert("q".to_string(), json!("a b"));
        map.insert("tag".to_string(), json!(["x", 2]));
        map.insert("empty".to_string(), json!(""));
        let encoded = encode_form(&map);
        let mut parts: Vec<&str> = encoded.split('&').collect();
        parts.sort();
        assert_eq!(parts, vec!["empty=", "q=a+b", "tag=2", "tag=x"]);

        let decoded = decode_form("a=1&b=&a=3");
        assert_eq!(decoded.get("a"), Some(&json!("3")));
        assert_eq!(decoded.get("b"), Some(&json!("")));
    }
}
