use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    Result, ScrapeflowError,
    request::{HttpExecutor, compile},
    store::{
        Store,
        data::{BatchItem, BatchTask, History, ItemStatus, SaveField, TaskStatus, Template},
    },
    utils,
};

use super::{
    artifact,
    control::{RunHandle, RunRegistry},
    rows::parse_rows,
};

pub const MAX_CONCURRENCY: u32 = 100;
pub const MAX_SLEEP_MS: u64 = 600_000;

/// Terminal counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
}

/// Everything a row unit needs, shared by all units of one run.
struct UnitContext {
    store: Arc<Store>,
    executor: Arc<HttpExecutor>,
    handle: Arc<RunHandle>,
    semaphore: Arc<Semaphore>,
    template: Template,
    output_dir: PathBuf,
    stamp: String,
    result_path: Option<String>,
    fields: Vec<SaveField>,
    delay: Duration,
}

/// Removes the run's control handle however the run ends.
struct Unregister<'a> {
    registry: &'a RunRegistry,
    task_id: &'a str,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.task_id);
        debug!(task_id = self.task_id, "run control removed");
    }
}

/// Executes batch tasks row by row under a concurrency limit.
#[derive(Clone)]
pub struct BatchRunner {
    store: Arc<Store>,
    executor: Arc<HttpExecutor>,
    runs: Arc<RunRegistry>,
}

impl BatchRunner {
    pub fn new(
        store: Arc<Store>,
        executor: Arc<HttpExecutor>,
        runs: Arc<RunRegistry>,
    ) -> Self {
        Self {
            store,
            executor,
            runs,
        }
    }

    /// Runs every row of `task` through `template` and records the task's final status: completed, failed when
    /// the run itself could not proceed, or pending again when it was stopped. `handle` must be registered for
    /// `task.id`; it is removed once the status is written.
    pub async fn run(
        &self,
        task: &BatchTask,
        template: &Template,
        handle: Arc<RunHandle>,
    ) -> Result<RunSummary> {
        let _unregister = Unregister {
            registry: &self.runs,
            task_id: &task.id,
        };

        let outcome = self.run_rows(task, template, &handle).await;
        let status = match &outcome {
            Ok(_) if handle.is_canceled() => TaskStatus::Pending,
            Ok(_) => TaskStatus::Completed,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "batch run failed");
                TaskStatus::Failed
            }
        };
        if let Err(e) = Self::set_task_status(&self.store, &task.id, status) {
            warn!(task_id = %task.id, status = status.as_ref(), error = %e, "failed to record task status");
        }
        outcome
    }

    async fn run_rows(
        &self,
        task: &BatchTask,
        template: &Template,
        handle: &Arc<RunHandle>,
    ) -> Result<RunSummary> {
        let output_dir = PathBuf::from(&task.output_dir);
        tokio::fs::create_dir_all(&output_dir).await?;
        let rows = parse_rows(&task.csv_data)?;

        self.store.clear_items_of_task(&task.id)?;
        let now = utils::time::time_millis();
        let mut items = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let item = BatchItem {
                id: utils::longid(),
                task_id: task.id.clone(),
                seq: idx as u32 + 1,
                params: row.clone(),
                status: ItemStatus::Pending,
                output_path: None,
                error: None,
                create_time: now,
                update_time: now,
            };
            self.store.batch_items().create(&item)?;
            items.push(item);
        }
        info!(task_id = %task.id, items = items.len(), output_dir = %output_dir.display(), "batch run initialized");

        let ctx = Arc::new(UnitContext {
            store: self.store.clone(),
            executor: self.executor.clone(),
            handle: handle.clone(),
            semaphore: Arc::new(Semaphore::new(task.concurrency.clamp(1, MAX_CONCURRENCY) as usize)),
            template: template.clone(),
            output_dir,
            stamp: utils::time::run_stamp(),
            result_path: task.result_path.clone(),
            fields: task.save_fields.clone().filter(|f| !f.is_empty()).unwrap_or_else(|| SaveField::ALL.to_vec()),
            delay: Duration::from_millis(task.sleep_ms.min(MAX_SLEEP_MS)),
        });

        let mut units = Vec::with_capacity(items.len());
        for (item, row) in items.into_iter().zip(rows) {
            let seq = item.seq;
            let id = item.id.clone();
            let join = tokio::spawn(Self::run_unit(ctx.clone(), item, row));
            handle.register_unit(seq, join.abort_handle());
            units.push((seq, id, join));
        }

        let (meta, joins): (Vec<_>, Vec<_>) = units.into_iter().map(|(seq, id, join)| ((seq, id), join)).unzip();
        for ((seq, id), joined) in meta.into_iter().zip(join_all(joins).await) {
            if let Err(e) = joined {
                let (status, error) = if e.is_cancelled() {
                    (ItemStatus::Canceled, None)
                } else {
                    warn!(task_id = %task.id, seq, "row unit panicked");
                    (ItemStatus::Failed, Some("row unit panicked".to_string()))
                };
                if let Err(e) = Self::set_status(&self.store, &id, status, error) {
                    warn!(task_id = %task.id, seq, error = %e, "failed to record aborted unit");
                }
            }
        }

        let summary = self.summarize(&task.id)?;
        info!(task_id = %task.id, total = summary.total, completed = summary.completed, failed = summary.failed, canceled = summary.canceled, "batch run finished");
        Ok(summary)
    }

    async fn run_unit(
        ctx: Arc<UnitContext>,
        item: BatchItem,
        row: Map<String, Value>,
    ) {
        let Ok(_permit) = ctx.semaphore.clone().acquire_owned().await else {
            return;
        };
        let (seq, id) = (item.seq, item.id.clone());

        if !ctx.handle.claim(seq) {
            debug!(task_id = %item.task_id, seq, "run stopped before unit start");
            if let Err(e) = Self::set_status(&ctx.store, &id, ItemStatus::Canceled, None) {
                warn!(task_id = %item.task_id, seq, error = %e, "failed to mark unit canceled");
            }
            return;
        }

        let task_id = item.task_id.clone();
        if let Err(e) = Self::execute_unit(&ctx, item, row).await {
            warn!(task_id = %task_id, seq, error = %e, "row unit bookkeeping failed");
            if let Err(e) = Self::set_status(&ctx.store, &id, ItemStatus::Failed, Some(e.to_string())) {
                warn!(task_id = %task_id, seq, error = %e, "failed to mark unit failed");
            }
        }

        // the slot is held through the delay
        tokio::time::sleep(ctx.delay).await;
    }

    async fn execute_unit(
        ctx: &UnitContext,
        mut item: BatchItem,
        mut row: Map<String, Value>,
    ) -> Result<()> {
        item.status = ItemStatus::Running;
        item.update_time = utils::time::time_millis();
        ctx.store.batch_items().update(&item)?;

        let output_name = row.remove("output_name");
        let mut params = ctx.template.default_params.clone();
        params.extend(row);

        let request = compile(&ctx.template, &params, &ctx.store);
        let result = ctx.executor.call(&request, &ctx.template.extraction()).await;

        let name = artifact::artifact_name(output_name.as_ref(), &ctx.template.name, &ctx.stamp, item.seq);
        let payload = artifact::payload(&result, &request, ctx.result_path.as_deref(), &ctx.fields);
        let path = Self::write_artifact(&ctx.output_dir, name, payload).await?;
        info!(task_id = %item.task_id, seq = item.seq, success = result.success, path = %path.display(), "row saved");

        if let Err(e) = ctx.store.histories().create(&History::record(Some(&ctx.template), &request, &result)) {
            warn!(task_id = %item.task_id, seq = item.seq, error = %e, "failed to save history");
        }

        item.status = if result.success {
            ItemStatus::Completed
        } else {
            ItemStatus::Failed
        };
        item.output_path = Some(path.display().to_string());
        item.error = result.error;
        item.update_time = utils::time::time_millis();
        ctx.store.batch_items().update(&item)?;
        Ok(())
    }

    async fn write_artifact(
        dir: &Path,
        name: String,
        payload: Value,
    ) -> Result<PathBuf> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || artifact::write(&dir, &name, &payload)).await.map_err(|e| ScrapeflowError::Batch(e.to_string()))?
    }

    pub(crate) fn set_task_status(
        store: &Store,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<bool> {
        let tasks = store.batch_tasks();
        let mut task = tasks.find(task_id)?;
        task.status = status;
        task.update_time = utils::time::time_millis();
        tasks.update(&task)
    }

    fn set_status(
        store: &Store,
        item_id: &str,
        status: ItemStatus,
        error: Option<String>,
    ) -> Result<bool> {
        let items = store.batch_items();
        let mut item = items.find(item_id)?;
        item.status = status;
        if error.is_some() {
            item.error = error;
        }
        item.update_time = utils::time::time_millis();
        items.update(&item)
    }

    fn summarize(
        &self,
        task_id: &str,
    ) -> Result<RunSummary> {
        let items = self.store.items_of_task(task_id)?;
        let count = |status: ItemStatus| items.iter().filter(|i| i.status == status).count();
        Ok(RunSummary {
            total: items.len(),
            completed: count(ItemStatus::Completed),
            failed: count(ItemStatus::Failed),
            canceled: count(ItemStatus::Canceled),
        })
    }
}
