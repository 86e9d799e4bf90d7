use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    request::{CallResult, HttpMethod, ResolvedRequest},
    store::{DbCollectionIden, DbDocument, StoreIden, data::Template},
    utils,
};

/// One executed call, request and outcome.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct History {
    pub id: String,
    pub template_id: Option<String>,
    pub template_name: Option<String>,
    pub url: String,
    pub method: HttpMethod,
    pub request_params: Map<String, Value>,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: Value,
    pub success: bool,
    pub response_data: Option<Value>,
    pub raw_response: Option<Value>,
    pub error: Option<String>,
    pub timestamp: i64,
}

impl History {
    pub fn record(
        template: Option<&Template>,
        request: &ResolvedRequest,
        result: &CallResult,
    ) -> Self {
        Self {
            id: utils::longid(),
            template_id: template.map(|t| t.id.clone()),
            template_name: template.map(|t| t.name.clone()),
            url: request.url.clone(),
            method: request.method,
            request_params: request.params.clone(),
            request_headers: request.headers.clone(),
            request_body: request.body.clone(),
            success: result.success,
            response_data: result.data.clone(),
            raw_response: result.raw_response.clone(),
            error: result.error.clone(),
            timestamp: utils::time::time_millis(),
        }
    }
}

impl DbCollectionIden for History {
    fn iden() -> StoreIden {
        StoreIden::Histories
    }
}

impl DbDocument for History {
    fn id(&self) -> &str {
        &self.id
    }
}
