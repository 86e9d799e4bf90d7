use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display};

use crate::store::{DbCollectionIden, DbDocument, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed | ItemStatus::Canceled)
    }
}

/// Fields a batch artifact may carry.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SaveField {
    Success,
    Error,
    Data,
    RawResponse,
    Request,
}

impl SaveField {
    pub const ALL: [SaveField; 5] = [SaveField::Success, SaveField::Error, SaveField::Data, SaveField::RawResponse, SaveField::Request];
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BatchTask {
    pub id: String,
    pub name: String,
    pub template_name: String,
    /// units allowed in flight, [1, 100]
    pub concurrency: u32,
    /// delay a unit waits before releasing its slot, [0, 600000]
    pub sleep_ms: u64,
    pub output_dir: String,
    /// csv with a header row
    pub csv_data: String,
    pub status: TaskStatus,
    pub save_fields: Option<Vec<SaveField>>,
    pub result_path: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl Default for BatchTask {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            template_name: String::new(),
            concurrency: 1,
            sleep_ms: 0,
            output_dir: String::new(),
            csv_data: String::new(),
            status: TaskStatus::Pending,
            save_fields: None,
            result_path: None,
            create_time: 0,
            update_time: 0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BatchItem {
    pub id: String,
    pub task_id: String,
    /// 1-based row number
    pub seq: u32,
    pub params: Map<String, Value>,
    pub status: ItemStatus,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for BatchTask {
    fn iden() -> StoreIden {
        StoreIden::BatchTasks
    }
}

impl DbDocument for BatchTask {
    fn id(&self) -> &str {
        &self.id
    }
}

impl DbCollectionIden for BatchItem {
    fn iden() -> StoreIden {
        StoreIden::BatchItems
    }
}

impl DbDocument for BatchItem {
    fn id(&self) -> &str {
        &self.id
    }
}
