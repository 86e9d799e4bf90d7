use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::{
    Config, Engine, Result, ScrapeflowError, StoreType,
    request::HttpExecutor,
    store::{DbStore, MemStore, PostgresStore, Store},
};

#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    handle: Option<Handle>,
    store: Option<Arc<Store>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Spawns batch runs on an existing runtime without owning it.
    pub fn handle(
        mut self,
        handle: Handle,
    ) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Uses an already initialized store instead of opening one from the config.
    pub fn store(
        mut self,
        store: Arc<Store>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the engine and loads every stored workflow definition.
    ///
    /// Without an explicit runtime or handle the current tokio runtime is used; outside of one a multi-thread
    /// runtime with `async_worker_thread_number` workers is created and owned by the engine.
    pub fn build(&self) -> Result<Engine> {
        let (handle, runtime) = match (&self.rt, &self.handle) {
            (Some(rt), _) => (rt.handle().clone(), Some(rt.clone())),
            (None, Some(handle)) => (handle.clone(), None),
            (None, None) => match Handle::try_current() {
                Ok(handle) => (handle, None),
                Err(_) => {
                    let rt = Arc::new(Builder::new_multi_thread().worker_threads(self.config.async_worker_thread_number.max(1).into()).enable_all().build()?);
                    (rt.handle().clone(), Some(rt))
                }
            },
        };

        let store = match &self.store {
            Some(store) => store.clone(),
            None => Arc::new(Self::open_store(&self.config, &handle)?),
        };
        let executor = Arc::new(HttpExecutor::new(self.config.http.timeout(), self.config.sandbox.timeout())?);

        let engine = Engine::new(store, executor, handle, runtime);
        engine.reload_workflows()?;

        Ok(engine)
    }

    fn open_store(
        config: &Config,
        handle: &Handle,
    ) -> Result<Store> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = config
                    .store
                    .postgres
                    .as_ref()
                    .ok_or_else(|| ScrapeflowError::Config("postgres configuration is required when store type is postgres".to_string()))?;
                Box::new(PostgresStore::new(&postgres.database_url, handle.clone())?)
            }
        };
        db.init(&store)?;

        Ok(store)
    }
}

#[cfg(test)]
mod test {
    use super::EngineBuilder;
    use crate::{Config, ScrapeflowError, StoreType};

    #[test]
    fn test_build_owns_runtime_outside_tokio() {
        let engine = EngineBuilder::new().async_worker_thread_number(2).build().unwrap();
        assert!(engine.workflow_names().is_empty());
        assert!(!engine.is_batch_running("any"));
    }

    #[test]
    fn test_postgres_without_settings_is_config_error() {
        let mut config = Config::default();
        config.store.store_type = StoreType::Postgres;
        let err = EngineBuilder::new().config(config).async_worker_thread_number(1).build().err().unwrap();
        assert!(matches!(err, ScrapeflowError::Config(_)));
    }
}
