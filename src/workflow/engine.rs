use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::{
    extract::extract,
    request::{CallResult, HttpExecutor, compile},
    store::Store,
};

use super::{Step, WorkflowRegistry};

/// Runs registered workflows step by step.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<Store>,
    executor: Arc<HttpExecutor>,
    registry: Arc<WorkflowRegistry>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<Store>,
        executor: Arc<HttpExecutor>,
        registry: Arc<WorkflowRegistry>,
    ) -> Self {
        Self {
            store,
            executor,
            registry,
        }
    }

    /// Executes workflow `name` and returns the last step's result. A step that exhausts its retries aborts the run.
    pub async fn execute(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> CallResult {
        let Some(definition) = self.registry.get(name) else {
            return CallResult::failure(format!("Workflow not found: {}", name), None);
        };
        info!(workflow = name, steps = definition.steps.len(), "workflow started");

        let mut context = json!({"params": params, "steps": {}});
        let mut last: Option<CallResult> = None;

        for step in &definition.steps {
            let (step_params, result) = match self.run_step(name, step, &context).await {
                Ok(accepted) => accepted,
                Err(failure) => {
                    warn!(workflow = name, step = %step.name, error = ?failure.error, "workflow aborted");
                    return failure;
                }
            };

            let extracted = Self::extract_outputs(step, &result);
            context["steps"][step.name.as_str()] = json!({
                "params": step_params,
                "extracted": extracted,
                "data": result.data,
            });
            info!(workflow = name, step = %step.name, "step accepted");
            last = Some(result);

            tokio::time::sleep(step.sleep.pick()).await;
        }

        last.unwrap_or_else(|| CallResult::failure("No steps executed", None))
    }

    /// Runs one step until a result is accepted, returning the resolved params with it.
    async fn run_step(
        &self,
        workflow: &str,
        step: &Step,
        context: &Value,
    ) -> std::result::Result<(Map<String, Value>, CallResult), CallResult> {
        let template = match self.store.find_template_by_name(&step.template_name) {
            Ok(template) => template,
            Err(_) => return Err(CallResult::failure(format!("Template not found in workflow: {}", step.template_name), None)),
        };

        let step_params: Map<String, Value> = step.input.iter().map(|(key, expr)| (key.clone(), expr.resolve(context))).collect();
        let extraction = template.extraction();

        let mut last: Option<CallResult> = None;
        for attempt in 1..=step.retry {
            let request = compile(&template, &step_params, &self.store);
            let result = self.executor.call(&request, &extraction).await;
            debug!(workflow, step = %step.name, attempt, success = result.success, "step attempt finished");

            if result.is_accepted() {
                return Ok((step_params, result));
            }
            last = Some(result);
            if attempt < step.retry {
                tokio::time::sleep(step.sleep.pick()).await;
            }
        }

        let raw_response = last.as_ref().and_then(|r| r.raw_response.clone());
        let error = last.and_then(|r| r.error).unwrap_or_else(|| format!("Workflow step failed: {}", step.name));
        Err(CallResult::failure(error, raw_response))
    }

    /// Each declared output is looked up in the extracted data first, then in the raw response.
    fn extract_outputs(
        step: &Step,
        result: &CallResult,
    ) -> Map<String, Value> {
        step.extract
            .iter()
            .map(|(key, path)| {
                let from_data = result.data.as_ref().map(|data| extract(data, path)).unwrap_or(Value::Null);
                let value = match (from_data, &result.raw_response) {
                    (Value::Null, Some(raw)) => extract(raw, path),
                    (found, _) => found,
                };
                (key.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::BTreeMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::{Map, Value, json};

    use super::WorkflowEngine;
    use crate::{
        request::HttpExecutor,
        store::{
            Store,
            data::{ExtractType, Template},
        },
        testkit,
        workflow::{WorkflowDefinition, WorkflowRegistry},
    };

    fn template(
        name: &str,
        url: String,
        json_path: Option<&str>,
    ) -> Template {
        Template {
            id: name.to_string(),
            name: name.to_string(),
            url,
            extract_type: ExtractType::Path,
            json_path: json_path.map(str::to_string),
            ..Default::default()
        }
    }

    fn engine(
        store: Arc<Store>,
        flows: Vec<(&str, Value)>,
    ) -> WorkflowEngine {
        let registry = Arc::new(WorkflowRegistry::new());
        for (name, definition) in flows {
            registry.register(name, WorkflowDefinition::from_value(&definition).unwrap());
        }
        let executor = Arc::new(HttpExecutor::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap());
        WorkflowEngine::new(store, executor, registry)
    }

    #[tokio::test]
    async fn test_two_step_workflow_propagates_values() {
        let app = Router::new()
            .route("/token", get(|Query(q): Query<BTreeMap<String, String>>| async move { Json(json!({"token": format!("tok-{}", q["question"]), "condition": "c1"})) }))
            .route(
                "/export",
                get(|Query(q): Query<BTreeMap<String, String>>| async move { Json(json!({"rows": [q.get("iwc_token"), q.get("condition")], "rand": q.get("nonce")})) }),
            );
        let base = testkit::serve(app).await;

        let store = testkit::mem_store();
        store.templates().create(&template("get-token", format!("{}/token", base), None)).unwrap();
        store.templates().create(&template("export", format!("{}/export", base), Some("rows"))).unwrap();

        let engine = engine(
            store,
            vec![(
                "two-step",
                json!({"steps": [
                    {"name": "step1", "template_name": "get-token", "input": {"question": "$.params.question"}, "extract": {"token": "$.token", "condition": "condition"}},
                    {"template_name": "export", "input": {
                        "iwc_token": "$.steps.step1.extracted.token",
                        "condition": "$.steps.step1.extracted.condition",
                        "nonce": "$random(10,99)"
                    }}
                ]}),
            )],
        );

        let mut params = Map::new();
        params.insert("question".to_string(), json!("q"));
        let result = engine.execute("two-step", &params).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data, Some(json!(["tok-q", "c1"])));
        let nonce: i64 = result.raw_response.unwrap()["rand"].as_str().unwrap().parse().unwrap();
        assert!((10..=99).contains(&nonce));
    }

    #[tokio::test]
    async fn test_outputs_fall_back_to_raw_response() {
        let app = Router::new()
            .route("/list", get(|| async { Json(json!({"items": [1, 2], "total": 7})) }))
            .route("/echo", get(|Query(q): Query<BTreeMap<String, String>>| async move { Json(json!({"first": q.get("first"), "total": q.get("total")})) }));
        let base = testkit::serve(app).await;

        let store = testkit::mem_store();
        store.templates().create(&template("list", format!("{}/list", base), Some("items"))).unwrap();
        store.templates().create(&template("echo", format!("{}/echo", base), None)).unwrap();

        let engine = engine(
            store,
            vec![(
                "paged",
                json!({"steps": [
                    {"name": "s1", "template_name": "list", "extract": {"first": "[0]", "total": "$.total"}},
                    {"template_name": "echo", "input": {"first": "$.steps.s1.extracted.first", "total": "$.steps.s1.extracted.total"}}
                ]}),
            )],
        );

        let result = engine.execute("paged", &Map::new()).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data, Some(json!({"first": "1", "total": "7"})));
    }

    #[tokio::test]
    async fn test_retry_makes_exact_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/down",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, "down")
                }
            }),
        );
        let base = testkit::serve(app).await;

        let store = testkit::mem_store();
        store.templates().create(&template("down", format!("{}/down", base), None)).unwrap();
        let engine = engine(store, vec![("flaky", json!({"steps": [{"name": "only", "template_name": "down", "retry": 3}]}))]);

        let result = engine.execute("flaky", &Map::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP error: 500 - down"));
        assert_eq!(result.raw_response, Some(json!("down")));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_null_data_is_not_accepted() {
        let app = Router::new().route("/empty", get(|| async { Json(json!({"other": 1})) }));
        let base = testkit::serve(app).await;

        let store = testkit::mem_store();
        store.templates().create(&template("empty", format!("{}/empty", base), Some("missing"))).unwrap();
        let engine = engine(store, vec![("flow", json!({"steps": [{"name": "fetch", "template_name": "empty", "retry": 2}]}))]);

        let result = engine.execute("flow", &Map::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Workflow step failed: fetch"));
        assert_eq!(result.raw_response, Some(json!({"other": 1})));
    }

    #[tokio::test]
    async fn test_configuration_failures() {
        let store = testkit::mem_store();
        let engine = engine(store, vec![("broken", json!({"steps": [{"template_name": "nowhere"}]})), ("empty", json!({"steps": []}))]);

        let missing = engine.execute("ghost", &Map::new()).await;
        assert_eq!(missing.error.as_deref(), Some("Workflow not found: ghost"));

        let broken = engine.execute("broken", &Map::new()).await;
        assert_eq!(broken.error.as_deref(), Some("Template not found in workflow: nowhere"));

        let empty = engine.execute("empty", &Map::new()).await;
        assert_eq!(empty.error.as_deref(), Some("No steps executed"));
    }
}
