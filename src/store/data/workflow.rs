use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{DbCollectionIden, DbDocument, StoreIden};

/// A stored workflow definition, keyed by its unique name.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub definition: Value,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Workflow {
    fn iden() -> StoreIden {
        StoreIden::Workflows
    }
}

impl DbDocument for Workflow {
    fn id(&self) -> &str {
        &self.id
    }
}
