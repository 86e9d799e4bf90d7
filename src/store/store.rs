use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{Result, ScrapeflowError, ShareLock};

use super::{DbCollection, DbCollectionIden, StoreIden, data::*, query::Query};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn templates(&self) -> Arc<dyn DbCollection<Item = Template>> {
        self.collection()
    }

    pub fn proxies(&self) -> Arc<dyn DbCollection<Item = Proxy>> {
        self.collection()
    }

    pub fn cookies(&self) -> Arc<dyn DbCollection<Item = Cookie>> {
        self.collection()
    }

    pub fn header_groups(&self) -> Arc<dyn DbCollection<Item = HeaderGroup>> {
        self.collection()
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow>> {
        self.collection()
    }

    pub fn batch_tasks(&self) -> Arc<dyn DbCollection<Item = BatchTask>> {
        self.collection()
    }

    pub fn batch_items(&self) -> Arc<dyn DbCollection<Item = BatchItem>> {
        self.collection()
    }

    pub fn histories(&self) -> Arc<dyn DbCollection<Item = History>> {
        self.collection()
    }

    /// Finds a template by its unique name.
    pub fn find_template_by_name(
        &self,
        name: &str,
    ) -> Result<Template> {
        trace!("store::find_template_by_name({})", name);
        let q = Query::new().with_filter("name", name).with_limit(1);
        self.templates().query(&q)?.rows.into_iter().next().ok_or_else(|| ScrapeflowError::Template(format!("template not found: {}", name)))
    }

    /// Finds a workflow definition record by its unique name.
    pub fn find_workflow_by_name(
        &self,
        name: &str,
    ) -> Result<Workflow> {
        trace!("store::find_workflow_by_name({})", name);
        let q = Query::new().with_filter("name", name).with_limit(1);
        self.workflows().query(&q)?.rows.into_iter().next().ok_or_else(|| ScrapeflowError::Workflow(format!("workflow not found: {}", name)))
    }

    /// All items of a batch task in sequence order.
    pub fn items_of_task(
        &self,
        task_id: &str,
    ) -> Result<Vec<BatchItem>> {
        trace!("store::items_of_task({})", task_id);
        let q = Query::new().with_filter("task_id", task_id).with_order("seq", false);
        Ok(self.batch_items().query(&q)?.rows)
    }

    /// Deletes every item of a batch task, returning how many were removed.
    pub fn clear_items_of_task(
        &self,
        task_id: &str,
    ) -> Result<usize> {
        trace!("store::clear_items_of_task({})", task_id);
        let items = self.batch_items();
        let mut removed = 0;
        for item in self.items_of_task(task_id)? {
            if items.delete(&item.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Creates or replaces a workflow definition keyed by name.
    pub fn deploy_workflow(
        &self,
        name: &str,
        definition: &serde_json::Value,
    ) -> Result<bool> {
        trace!("store::deploy_workflow({})", name);
        if name.is_empty() {
            return Err(ScrapeflowError::Workflow("missing name in workflow".into()));
        }
        let workflows = self.workflows();
        match self.find_workflow_by_name(name) {
            Ok(m) => {
                let data = Workflow {
                    definition: definition.clone(),
                    update_time: crate::utils::time::time_millis(),
                    ..m
                };
                workflows.update(&data)
            }
            Err(_) => {
                let data = Workflow {
                    id: crate::utils::longid(),
                    name: name.to_string(),
                    description: String::new(),
                    definition: definition.clone(),
                    create_time: crate::utils::time::time_millis(),
                    update_time: 0,
                };
                workflows.create(&data)
            }
        }
    }
}
