//! Response extraction: path lookups and sandboxed parser snippets.

pub mod path;
pub mod sandbox;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use path::extract;
pub use sandbox::{CodeLanguage, EvalError, Evaluator, JavascriptExecutor, PythonExecutor};

/// How a successful response body is turned into a call's `data`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Extraction {
    /// Return the parsed body as-is.
    #[default]
    None,
    /// Dot/bracket path into the parsed body.
    Path { path: String },
    /// Parser snippet defining `parse(data)`.
    Code {
        #[serde(default)]
        language: CodeLanguage,
        code: String,
    },
}

impl Extraction {
    pub fn path(path: &str) -> Self {
        Self::Path {
            path: path.to_string(),
        }
    }

    pub fn python(code: &str) -> Self {
        Self::Code {
            language: CodeLanguage::Python3,
            code: code.to_string(),
        }
    }

    pub fn javascript(code: &str) -> Self {
        Self::Code {
            language: CodeLanguage::Javascript,
            code: code.to_string(),
        }
    }

    /// Applies the policy to a parsed body. Only snippet evaluation can fail.
    pub async fn apply(
        &self,
        data: &Value,
        raw_response: &str,
        timeout: Duration,
    ) -> Result<Value, EvalError> {
        match self {
            Extraction::None => Ok(data.clone()),
            Extraction::Path {
                path,
            } => Ok(extract(data, path)),
            Extraction::Code {
                language,
                code,
            } => sandbox::evaluate(*language, code, data, raw_response, timeout).await,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::Extraction;

    #[tokio::test]
    async fn test_apply_path_and_none() {
        let data = json!({"items": [{"id": 7}]});
        let timeout = Duration::from_secs(1);
        assert_eq!(Extraction::None.apply(&data, "", timeout).await, Ok(data.clone()));
        assert_eq!(Extraction::path("items[0].id").apply(&data, "", timeout).await, Ok(json!(7)));
        assert_eq!(Extraction::path("items[3].id").apply(&data, "", timeout).await, Ok(json!(null)));
    }

    #[test]
    fn test_extraction_deserialize() {
        let code: Extraction = serde_json::from_value(json!({"type": "code", "code": "def parse(data):\n    return data\n"})).unwrap();
        assert!(matches!(code, Extraction::Code { language: super::CodeLanguage::Python3, .. }));

        let path: Extraction = serde_json::from_value(json!({"type": "path", "path": "a.b"})).unwrap();
        assert_eq!(path, Extraction::path("a.b"));
    }
}
