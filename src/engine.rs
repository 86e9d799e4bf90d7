//! Engine - the main entry point for Scrapeflow.
//!
//! The engine wires the store, the HTTP executor, the workflow registry and the batch runner together and exposes:
//! - Single calls, with or without a stored template
//! - Workflow execution and registry maintenance
//! - Batch start/stop and progress lookup
//! - Scheduled triggers that push their result to a notifier

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, warn};

use crate::{
    Result, ScrapeflowError,
    batch::{BatchRunner, MAX_CONCURRENCY, MAX_SLEEP_MS, RunRegistry},
    extract::Extraction,
    notify::{Notifier, PushMessage, PushTarget, render},
    request::{CallResult, HttpExecutor, ResolvedRequest, compile},
    store::{
        Store,
        data::{BatchItem, BatchTask, History, TaskStatus, Template},
    },
    workflow::{WorkflowDefinition, WorkflowEngine, WorkflowRegistry},
};

/// Title of the message pushed after a scheduled call.
const TRIGGER_TITLE: &str = "Scheduled task result";

/// The orchestration engine.
///
/// Engine owns the process-local state that must outlive single calls:
/// - the workflow registry, rebuilt from the store at startup
/// - the run registry of active batch runs
/// - the tokio runtime handle batch runs are spawned on
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().config(Config::create("scrapeflow.toml")?).build()?;
///
/// let result = engine.call_template("search", &params).await?;
/// let result = engine.execute_workflow("two-step-export", &params).await;
///
/// engine.start_batch(&task_id)?;
/// engine.stop_batch(&task_id)?;
/// ```
pub struct Engine {
    store: Arc<Store>,
    executor: Arc<HttpExecutor>,
    /// Parsed workflow definitions keyed by name.
    workflows: Arc<WorkflowRegistry>,
    workflow_engine: WorkflowEngine,
    /// Control handles of active batch runs.
    runs: Arc<RunRegistry>,
    batch: BatchRunner,

    handle: Handle,
    /// Runtime built by the engine itself, kept alive as long as the engine.
    _runtime: Option<Arc<Runtime>>,
}

impl Engine {
    pub(crate) fn new(
        store: Arc<Store>,
        executor: Arc<HttpExecutor>,
        handle: Handle,
        runtime: Option<Arc<Runtime>>,
    ) -> Self {
        let workflows = Arc::new(WorkflowRegistry::new());
        let runs = Arc::new(RunRegistry::new());

        Self {
            workflow_engine: WorkflowEngine::new(store.clone(), executor.clone(), workflows.clone()),
            batch: BatchRunner::new(store.clone(), executor.clone(), runs.clone()),
            store,
            executor,
            workflows,
            runs,
            handle,
            _runtime: runtime,
        }
    }

    /// Returns a reference to the store.
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    /// Executes an already resolved request without a template.
    pub async fn scrape(
        &self,
        request: &ResolvedRequest,
        extraction: &Extraction,
    ) -> CallResult {
        self.executor.call(request, extraction).await
    }

    /// Compiles template `name` with `params`, executes it and records the call in history.
    ///
    /// Only a missing template is an error; call failures are reported in the returned result.
    pub async fn call_template(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<CallResult> {
        let template = self.store.find_template_by_name(name)?;
        Ok(self.run_template(&template, params).await)
    }

    /// Runs `name` as a template when one exists, otherwise as the registered workflow of that name.
    pub async fn call(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> CallResult {
        match self.store.find_template_by_name(name) {
            Ok(template) => self.run_template(&template, params).await,
            Err(ScrapeflowError::Template(_)) => {
                debug!(name, "no template by name, running workflow");
                self.execute_workflow(name, params).await
            }
            Err(e) => CallResult::failure(e.to_string(), None),
        }
    }

    async fn run_template(
        &self,
        template: &Template,
        params: &Map<String, Value>,
    ) -> CallResult {
        let request = compile(template, params, &self.store);
        let result = self.executor.call(&request, &template.extraction()).await;
        debug!(template = %template.name, success = result.success, "template called");

        if let Err(e) = self.store.histories().create(&History::record(Some(template), &request, &result)) {
            warn!(template = %template.name, error = %e, "failed to save history");
        }
        result
    }

    /// Runs the registered workflow `name`.
    pub async fn execute_workflow(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> CallResult {
        self.workflow_engine.execute(name, params).await
    }

    /// Rebuilds the workflow registry from the store and returns the number of loaded definitions.
    pub fn reload_workflows(&self) -> Result<usize> {
        self.workflows.refresh_from_store(&self.store)
    }

    /// Validates `definition`, persists it under `name` and replaces the registered definition.
    pub fn deploy_workflow(
        &self,
        name: &str,
        definition: &Value,
    ) -> Result<()> {
        let parsed = WorkflowDefinition::from_value(definition)?;
        self.store.deploy_workflow(name, definition)?;
        self.workflows.register(name, parsed);
        info!(workflow = name, "workflow deployed");
        Ok(())
    }

    /// Names of every registered workflow.
    pub fn workflow_names(&self) -> Vec<String> {
        self.workflows.names()
    }

    /// Starts a background run of batch task `task_id`.
    ///
    /// Returns `Ok(false)` without doing anything when a run of the task is already active.
    pub fn start_batch(
        &self,
        task_id: &str,
    ) -> Result<bool> {
        let task = self.store.batch_tasks().find(task_id)?;
        Self::validate_task(&task)?;
        let template = self.store.find_template_by_name(&task.template_name)?;

        let Some(run) = self.runs.register(task_id) else {
            info!(task_id, "batch already running");
            return Ok(false);
        };
        if let Err(e) = BatchRunner::set_task_status(&self.store, task_id, TaskStatus::Running) {
            self.runs.unregister(task_id);
            return Err(e);
        }

        let runner = self.batch.clone();
        self.handle.spawn(async move {
            if let Ok(summary) = runner.run(&task, &template, run).await {
                debug!(task_id = %task.id, ?summary, "batch run returned");
            }
        });
        info!(task_id, "batch started");
        Ok(true)
    }

    /// Stops the active run of `task_id` and returns the task to pending.
    ///
    /// Rows already executing finish; rows not yet started end canceled. Returns `Ok(false)` when no run is
    /// active.
    pub fn stop_batch(
        &self,
        task_id: &str,
    ) -> Result<bool> {
        if !self.runs.cancel(task_id) {
            return Ok(false);
        }
        BatchRunner::set_task_status(&self.store, task_id, TaskStatus::Pending)?;
        info!(task_id, "batch stopped");
        Ok(true)
    }

    pub fn is_batch_running(
        &self,
        task_id: &str,
    ) -> bool {
        self.runs.is_running(task_id)
    }

    /// Items of batch task `task_id` in sequence order.
    pub fn batch_items(
        &self,
        task_id: &str,
    ) -> Result<Vec<BatchItem>> {
        self.store.items_of_task(task_id)
    }

    /// Runs a scheduled scrape and, when it succeeds, pushes the rendered data to `target` through `notifier`.
    /// Scheduled scrapes are not recorded in history. A failed push is logged and does not change the result.
    pub async fn trigger(
        &self,
        request: &ResolvedRequest,
        extraction: &Extraction,
        target: Option<&PushTarget>,
        notifier: &dyn Notifier,
    ) -> CallResult {
        let result = self.scrape(request, extraction).await;
        info!(url = %request.url, success = result.success, "scheduled call finished");

        if let (true, Some(target)) = (result.success, target) {
            let message = PushMessage::text(TRIGGER_TITLE, render(result.data.as_ref()));
            let outcome = notifier.push(&target.webhook_url, &message).await;
            if outcome.success {
                info!(url = %request.url, channel = %target.channel, "result pushed");
            } else {
                warn!(url = %request.url, channel = %target.channel, error = ?outcome.error, "result push failed");
            }
        }
        result
    }

    fn validate_task(task: &BatchTask) -> Result<()> {
        if !(1..=MAX_CONCURRENCY).contains(&task.concurrency) {
            return Err(ScrapeflowError::Batch(format!("concurrency must be within 1..={}, got {}", MAX_CONCURRENCY, task.concurrency)));
        }
        if task.sleep_ms > MAX_SLEEP_MS {
            return Err(ScrapeflowError::Batch(format!("sleep_ms must be at most {}, got {}", MAX_SLEEP_MS, task.sleep_ms)));
        }
        if task.output_dir.trim().is_empty() {
            return Err(ScrapeflowError::Batch("output_dir is required".to_string()));
        }
        Ok(())
    }
}
