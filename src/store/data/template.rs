use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    extract::{CodeLanguage, Extraction},
    request::HttpMethod,
    store::{DbCollectionIden, DbDocument, StoreIden},
};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractType {
    #[default]
    Path,
    Code,
}

/// A reusable request definition, compiled per call together with caller parameters.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub default_params: Map<String, Value>,
    /// mapping, urlencoded text, or null
    pub body: Value,
    pub extract_type: ExtractType,
    pub json_path: Option<String>,
    pub parser_code: Option<String>,
    pub code_language: CodeLanguage,
    pub proxy_id: Option<String>,
    pub cookie_id: Option<String>,
    pub header_group_id: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl Template {
    /// The extraction policy selected by `extract_type`. A blank path or snippet extracts nothing.
    pub fn extraction(&self) -> Extraction {
        match self.extract_type {
            ExtractType::Path => match self.json_path.as_deref().map(str::trim) {
                Some(path) if !path.is_empty() => Extraction::path(path),
                _ => Extraction::None,
            },
            ExtractType::Code => match self.parser_code.as_deref() {
                Some(code) if !code.trim().is_empty() => Extraction::Code {
                    language: self.code_language,
                    code: code.to_string(),
                },
                _ => Extraction::None,
            },
        }
    }
}

impl DbCollectionIden for Template {
    fn iden() -> StoreIden {
        StoreIden::Templates
    }
}

impl DbDocument for Template {
    fn id(&self) -> &str {
        &self.id
    }
}
