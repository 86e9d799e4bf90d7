mod collect;

use std::sync::Arc;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

#[derive(Debug, Clone)]
pub struct MemStore {
    templates: Arc<Collect<Template>>,
    proxies: Arc<Collect<Proxy>>,
    cookies: Arc<Collect<Cookie>>,
    header_groups: Arc<Collect<HeaderGroup>>,
    workflows: Arc<Collect<Workflow>>,
    batch_tasks: Arc<Collect<BatchTask>>,
    batch_items: Arc<Collect<BatchItem>>,
    histories: Arc<Collect<History>>,
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.templates());
        s.register(self.proxies());
        s.register(self.cookies());
        s.register(self.header_groups());
        s.register(self.workflows());
        s.register(self.batch_tasks());
        s.register(self.batch_items());
        s.register(self.histories());
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(Collect::new("templates")),
            proxies: Arc::new(Collect::new("proxies")),
            cookies: Arc::new(Collect::new("cookies")),
            header_groups: Arc::new(Collect::new("header_groups")),
            workflows: Arc::new(Collect::new("workflows")),
            batch_tasks: Arc::new(Collect::new("batch_tasks")),
            batch_items: Arc::new(Collect::new("batch_items")),
            histories: Arc::new(Collect::new("histories")),
        }
    }

    pub fn templates(&self) -> Arc<dyn DbCollection<Item = Template> + Send + Sync> {
        self.templates.clone()
    }

    pub fn proxies(&self) -> Arc<dyn DbCollection<Item = Proxy> + Send + Sync> {
        self.proxies.clone()
    }

    pub fn cookies(&self) -> Arc<dyn DbCollection<Item = Cookie> + Send + Sync> {
        self.cookies.clone()
    }

    pub fn header_groups(&self) -> Arc<dyn DbCollection<Item = HeaderGroup> + Send + Sync> {
        self.header_groups.clone()
    }

    pub fn workflows(&self) -> Arc<dyn DbCollection<Item = Workflow> + Send + Sync> {
        self.workflows.clone()
    }

    pub fn batch_tasks(&self) -> Arc<dyn DbCollection<Item = BatchTask> + Send + Sync> {
        self.batch_tasks.clone()
    }

    pub fn batch_items(&self) -> Arc<dyn DbCollection<Item = BatchItem> + Send + Sync> {
        self.batch_items.clone()
    }

    pub fn histories(&self) -> Arc<dyn DbCollection<Item = History> + Send + Sync> {
        self.histories.clone()
    }
}
