//! Storage layer for templates, attachments, workflow definitions, batch state and call history.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: In-memory storage for testing
//! - `PostgresStore`: PostgreSQL for production persistence

pub mod data;
mod db;
pub mod query;
mod store;

use std::error::Error;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use strum::{AsRefStr, EnumIter};

use crate::{Result, ScrapeflowError};

use query::*;

pub use db::{MemStore, PostgresStore};
pub use store::Store;

/// Maps database errors to ScrapeflowError.
fn map_db_err(err: impl Error) -> ScrapeflowError {
    ScrapeflowError::Store(err.to_string())
}

/// Identifiers for different storage collections.
#[derive(Debug, Clone, AsRefStr, PartialEq, Hash, Eq, EnumIter)]
pub enum StoreIden {
    /// Request templates.
    #[strum(serialize = "templates")]
    Templates,
    /// Proxy attachments.
    #[strum(serialize = "proxies")]
    Proxies,
    /// Cookie attachments.
    #[strum(serialize = "cookies")]
    Cookies,
    /// Header group attachments.
    #[strum(serialize = "header_groups")]
    HeaderGroups,
    /// Workflow definitions.
    #[strum(serialize = "workflows")]
    Workflows,
    /// Batch tasks.
    #[strum(serialize = "batch_tasks")]
    BatchTasks,
    /// Batch items, one per row of a run.
    #[strum(serialize = "batch_items")]
    BatchItems,
    /// Per-call history records.
    #[strum(serialize = "histories")]
    Histories,
}

/// Paginated query result.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageData<T> {
    /// Total number of matching records.
    pub count: usize,
    /// Current page number (1-based).
    pub page_num: usize,
    /// Total number of pages.
    pub page_count: usize,
    /// Number of records per page, 0 when unbounded.
    pub page_size: usize,
    /// Records in the current page.
    pub rows: Vec<T>,
}

impl<T> PageData<T> {
    fn new(
        count: usize,
        q: &Query,
        rows: Vec<T>,
    ) -> Self {
        let (page_count, page_num) = match q.limit() {
            0 => (usize::from(count > 0), 1),
            limit => (count.div_ceil(limit), q.offset() / limit + 1),
        };
        Self {
            count,
            page_num,
            page_count,
            page_size: q.limit(),
            rows,
        }
    }
}

/// Trait for types that can identify their storage collection.
pub trait DbCollectionIden {
    /// Returns the collection identifier for this type.
    fn iden() -> StoreIden;
}

/// Records stored as JSON documents keyed by `id`.
pub trait DbDocument: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn id(&self) -> &str;

    /// The record's fields as a flat JSON object, used for filtering and ordering.
    fn doc(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ScrapeflowError::Convert(format!("record is not a document: {}", other))),
        }
    }
}

/// Trait for database collection operations.
pub trait DbCollection: Send + Sync {
    /// The type of items stored in this collection.
    type Item;

    /// Checks if a record with the given ID exists.
    fn exists(
        &self,
        id: &str,
    ) -> Result<bool>;

    /// Finds a record by ID.
    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item>;

    /// Queries records with pagination and filtering.
    fn query(
        &self,
        query: &Query,
    ) -> Result<PageData<Self::Item>>;

    /// Creates a new record.
    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Updates an existing record.
    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool>;

    /// Deletes a record by ID.
    fn delete(
        &self,
        id: &str,
    ) -> Result<bool>;
}

/// Trait for database store initialization.
pub trait DbStore {
    /// Initializes the database and registers collections with the store.
    fn init(
        &self,
        s: &Store,
    ) -> Result<()>;
}
