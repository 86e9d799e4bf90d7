//! Sandboxed evaluation of user-supplied parser snippets.
//!
//! A snippet defines `parse(data)` and may read the `raw_response` global. Snippets are screened for
//! disallowed constructs before anything runs, then executed in a fresh interpreter with a trimmed
//! builtin set, off the async worker threads and under a wall-clock limit.

use std::{
    sync::{
        Arc, LazyLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use regex::Regex;
use rquickjs::{Context as JsContext, FromJs, Runtime as JsRuntime};
use rustpython_vm::{
    AsObject, Interpreter, Py, PyObjectRef, PyResult, VirtualMachine,
    builtins::{PyBaseExceptionRef, PyDict, PyFloat, PyInt, PyList, PyStr, PyTuple},
    bytecode::{CodeObject, ConstantData},
    compiler::{self, CompileOpts, Mode},
    signal::{UserSignalReceiver, UserSignalSender, user_signal_channel},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Snippet language
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodeLanguage {
    #[default]
    Python3,
    Javascript,
}

/// The three ways an evaluation can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The snippet exceeded its wall-clock budget.
    #[error("Parser code execution timed out")]
    Timeout,
    /// Syntax error, missing `parse`, or an exception raised while running.
    #[error("{0}")]
    Execution(String),
    /// A disallowed construct was found before execution.
    #[error("{0}")]
    Security(String),
}

/// Narrow capability boundary for running parser snippets.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        code: &str,
        data: &Value,
        raw_response: &str,
        timeout: Duration,
    ) -> Result<Value, EvalError>;
}

/// Evaluates `code` in the sandbox for `language`. A blank snippet returns `data` unchanged.
pub async fn evaluate(
    language: CodeLanguage,
    code: &str,
    data: &Value,
    raw_response: &str,
    timeout: Duration,
) -> Result<Value, EvalError> {
    if code.trim().is_empty() {
        return Ok(data.clone());
    }
    match language {
        CodeLanguage::Python3 => PythonExecutor.evaluate(code, data, raw_response, timeout).await,
        CodeLanguage::Javascript => JavascriptExecutor.evaluate(code, data, raw_response, timeout).await,
    }
}

struct Rule {
    pattern: Regex,
    message: &'static str,
}

impl Rule {
    fn new(
        pattern: &str,
        message: &'static str,
    ) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid screening pattern"),
            message,
        }
    }
}

fn screen(
    code: &str,
    rules: &[Rule],
) -> Result<(), EvalError> {
    for rule in rules {
        if let Some(found) = rule.pattern.find(code) {
            return Err(EvalError::Security(format!("{}: '{}'", rule.message, found.as_str().trim())));
        }
    }
    Ok(())
}

static PYTHON_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"\.\s*_\w*", "Access to private attribute is not allowed"),
        Rule::new(r"\b__\w+__\b", "Access to dunder names is not allowed"),
        Rule::new(r"(?m)^\s*(import|from)\s+\w", "Import statements are not allowed"),
        Rule::new(r"(?m)^\s*except\s*:", "Bare except clauses are not allowed"),
        Rule::new(
            r"\b(exec|eval|compile|open|getattr|setattr|delattr|globals|locals|vars|input|breakpoint|help|memoryview|exit|quit)\s*\(",
            "Parser code contains disallowed operations",
        ),
    ]
});

static JAVASCRIPT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"\.\s*_\w*", "Access to private attribute is not allowed"),
        Rule::new(r#"\[\s*["'`]_"#, "Access to private attribute is not allowed"),
        Rule::new(
            r"\b(eval|Function|constructor|prototype|globalThis|import|require)\b",
            "Parser code contains disallowed operations",
        ),
    ]
});

/// Builtins left visible to Python snippets.
const PYTHON_BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "chr", "dict", "divmod", "enumerate", "filter", "float", "frozenset", "hash", "int", "isinstance", "iter", "len", "list", "map",
    "max", "min", "next", "ord", "pow", "range", "repr", "reversed", "round", "set", "slice", "sorted", "str", "sum", "tuple", "zip", "Exception", "ValueError",
    "KeyError", "IndexError", "TypeError", "ZeroDivisionError", "StopIteration", "AttributeError", "ArithmeticError",
];

/// Names that must not appear in compiled Python code: format strings resolve attributes by name at runtime.
const PYTHON_DENIED_NAMES: &[&str] = &["format", "format_map"];

/// How long an interrupted interpreter gets to unwind before its thread is abandoned.
const PYTHON_UNWIND_GRACE: Duration = Duration::from_millis(500);
const PYTHON_INTERRUPT_RETRY: Duration = Duration::from_millis(20);

type PythonOutcome = oneshot::Receiver<Result<Value, EvalError>>;

pub struct PythonExecutor;

#[async_trait]
impl Evaluator for PythonExecutor {
    async fn evaluate(
        &self,
        code: &str,
        data: &Value,
        raw_response: &str,
        timeout: Duration,
    ) -> Result<Value, EvalError> {
        screen(code, &PYTHON_RULES)?;
        screen_names(&Self::compile(code)?)?;
        Self::run(code, data, raw_response, timeout, Arc::new(())).await
    }
}

/// Rejects private and format-style names anywhere in the compiled code, nested functions included.
fn screen_names(code: &CodeObject) -> Result<(), EvalError> {
    for name in code.names.iter() {
        if name.starts_with('_') {
            return Err(EvalError::Security(format!("Access to private attribute is not allowed: '{}'", name)));
        }
        if PYTHON_DENIED_NAMES.contains(&name.as_str()) {
            return Err(EvalError::Security(format!("Parser code contains disallowed operations: '{}'", name)));
        }
    }
    for constant in code.constants.iter() {
        if let ConstantData::Code { code } = constant {
            screen_names(code)?;
        }
    }
    Ok(())
}

impl PythonExecutor {
    fn compile(code: &str) -> Result<CodeObject, EvalError> {
        compiler::compile(code, Mode::Exec, "<parser>".to_owned(), CompileOpts::default())
            .map_err(|e| EvalError::Execution(format!("Syntax error in parser code: {}", e)))
    }

    /// Runs the snippet on its own thread. Past the deadline the interpreter is interrupted and the thread joined.
    /// `liveness` is held by the thread until it exits.
    async fn run(
        code: &str,
        data: &Value,
        raw_response: &str,
        timeout: Duration,
        liveness: Arc<()>,
    ) -> Result<Value, EvalError> {
        let (tx, mut rx) = oneshot::channel();
        let (interrupt, signals) = user_signal_channel();
        let (code, data, raw_response) = (code.to_owned(), data.clone(), raw_response.to_owned());
        let worker = std::thread::Builder::new()
            .name("parser-python".to_string())
            .spawn(move || {
                let _liveness = liveness;
                let _ = tx.send(Self::execute(&code, &data, &raw_response, signals));
            })
            .map_err(|e| EvalError::Execution(format!("failed to start parser: {}", e)))?;

        let (result, finished) = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => (result, true),
            Ok(Err(_)) => (Err(EvalError::Execution("Parser execution failed: interpreter aborted".to_string())), true),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "python parser timed out");
                (Err(EvalError::Timeout), Self::interrupt(&interrupt, &mut rx).await)
            }
        };

        if finished {
            if let Err(e) = tokio::task::spawn_blocking(move || worker.join()).await {
                warn!(error = %e, "failed to join python parser thread");
            }
        } else {
            warn!(grace_ms = PYTHON_UNWIND_GRACE.as_millis() as u64, "python parser ignored interrupt, abandoning its thread");
        }
        result
    }

    /// Raises `KeyboardInterrupt` inside the interpreter until it unwinds. Returns false if it is still running
    /// after the grace period.
    async fn interrupt(
        sender: &UserSignalSender,
        outcome: &mut PythonOutcome,
    ) -> bool {
        let deadline = Instant::now() + PYTHON_UNWIND_GRACE;
        while Instant::now() < deadline {
            // fails once the interpreter is gone
            let _ = sender.send(Box::new(Self::raise_interrupt));
            if tokio::time::timeout(PYTHON_INTERRUPT_RETRY, &mut *outcome).await.is_ok() {
                debug!("python parser interrupted at deadline");
                return true;
            }
        }
        false
    }

    fn raise_interrupt(vm: &VirtualMachine) -> PyResult<()> {
        Err(vm.new_exception_msg(vm.ctx.exceptions.keyboard_interrupt.to_owned(), "parser deadline exceeded".to_owned()))
    }

    /// Runs the snippet to completion on the current thread, checking `signals` between instructions.
    fn execute(
        code: &str,
        data: &Value,
        raw_response: &str,
        signals: UserSignalReceiver,
    ) -> Result<Value, EvalError> {
        Interpreter::with_init(Default::default(), move |vm| vm.set_user_signal_channel(signals)).enter(|vm| {
            Self::restrict_builtins(vm)?;
            let scope = vm.new_scope_with_builtins();

            let code_obj = vm
                .compile(code, Mode::Exec, "<parser>".to_owned())
                .map_err(|e| EvalError::Execution(format!("Syntax error in parser code: {}", e)))?;

            let py_data = Self::json_to_pyobject(vm, data);
            let _ = scope.globals.set_item("data", py_data.clone(), vm);
            let _ = scope.globals.set_item("raw_response", vm.ctx.new_str(raw_response).into(), vm);

            vm.run_code_obj(code_obj, scope.clone())
                .map_err(|e| EvalError::Execution(format!("Parser execution failed: {}", Self::describe(vm, &e))))?;

            let func = scope
                .globals
                .get_item("parse", vm)
                .map_err(|_| EvalError::Execution("Parser code must define a 'parse(data)' function".to_string()))?;

            let result = func.call((py_data,), vm).map_err(|e| EvalError::Execution(format!("Parser execution failed: {}", Self::describe(vm, &e))))?;

            Self::pyobject_to_json(vm, &result)
        })
    }

    /// Drops every builtin outside the allow-list. The interpreter is per-call, so this never leaks.
    fn restrict_builtins(vm: &VirtualMachine) -> Result<(), EvalError> {
        let builtins = vm.builtins.dict();
        let table: &Py<PyDict> = &builtins;
        let denied: Vec<PyObjectRef> = table
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| k.payload::<PyStr>().is_none_or(|name| !PYTHON_BUILTINS.contains(&name.as_str())))
            .collect();
        for key in denied {
            if let Err(e) = table.del_item(&*key, vm) {
                let name = key.str(vm).map(|s| s.as_str().to_string()).unwrap_or_default();
                warn!(builtin = %name, "failed to remove builtin from parser sandbox");
                return Err(EvalError::Execution(format!("Parser sandbox setup failed: {}", Self::describe(vm, &e))));
            }
        }
        Ok(())
    }

    fn describe(
        vm: &VirtualMachine,
        exc: &PyBaseExceptionRef,
    ) -> String {
        let name = exc.as_object().class().name().to_string();
        match exc.as_object().str(vm) {
            Ok(msg) if !msg.as_str().is_empty() => format!("{}: {}", name, msg.as_str()),
            _ => name,
        }
    }

    /// Convert serde_json::Value to Python object
    fn json_to_pyobject(
        vm: &VirtualMachine,
        value: &Value,
    ) -> PyObjectRef {
        match value {
            Value::Null => vm.ctx.none(),
            Value::Bool(b) => vm.ctx.new_bool(*b).into(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    vm.ctx.new_int(i).into()
                } else if let Some(f) = n.as_f64() {
                    vm.ctx.new_float(f).into()
                } else {
                    vm.ctx.none()
                }
            }
            Value::String(s) => vm.ctx.new_str(s.as_str()).into(),
            Value::Array(arr) => {
                let items: Vec<PyObjectRef> = arr.iter().map(|v| Self::json_to_pyobject(vm, v)).collect();
                vm.ctx.new_list(items).into()
            }
            Value::Object(obj) => {
                let py_dict = vm.ctx.new_dict();
                for (k, v) in obj {
                    let _ = py_dict.set_item(k.as_str(), Self::json_to_pyobject(vm, v), vm);
                }
                py_dict.into()
            }
        }
    }

    /// Convert Python object to serde_json::Value
    fn pyobject_to_json(
        vm: &VirtualMachine,
        obj: &PyObjectRef,
    ) -> Result<Value, EvalError> {
        if vm.is_none(obj) {
            return Ok(Value::Null);
        }

        // bool is a subclass of int, check it first
        if obj.fast_isinstance(vm.ctx.types.bool_type) {
            return Ok(Value::Bool(obj.is(&vm.ctx.true_value)));
        }

        if let Some(i) = obj.payload::<PyInt>() {
            if let Ok(n) = i.try_to_primitive::<i64>(vm) {
                return Ok(Value::Number(n.into()));
            }
            return Ok(Value::String(i.as_bigint().to_string()));
        }

        if let Some(f) = obj.payload::<PyFloat>() {
            return Ok(serde_json::Number::from_f64(f.to_f64()).map(Value::Number).unwrap_or(Value::Null));
        }

        if let Some(s) = obj.payload::<PyStr>() {
            return Ok(Value::String(s.as_str().to_string()));
        }

        if let Some(list) = obj.payload::<PyList>() {
            return list.borrow_vec().iter().map(|item| Self::pyobject_to_json(vm, item)).collect::<Result<Vec<_>, _>>().map(Value::Array);
        }

        if let Some(tuple) = obj.payload::<PyTuple>() {
            return tuple.as_slice().iter().map(|item| Self::pyobject_to_json(vm, item)).collect::<Result<Vec<_>, _>>().map(Value::Array);
        }

        if let Some(dict) = obj.payload::<PyDict>() {
            let mut map = serde_json::Map::new();
            for (k, v) in dict {
                let key = match k.payload::<PyStr>() {
                    Some(s) => s.as_str().to_string(),
                    None => k.str(vm).map(|s| s.as_str().to_string()).unwrap_or_default(),
                };
                map.insert(key, Self::pyobject_to_json(vm, &v)?);
            }
            return Ok(Value::Object(map));
        }

        obj.str(vm)
            .map(|s| Value::String(s.as_str().to_string()))
            .map_err(|e| EvalError::Execution(format!("Parser returned an unsupported value: {}", Self::describe(vm, &e))))
    }
}

pub struct JavascriptExecutor;

const JS_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

#[async_trait]
impl Evaluator for JavascriptExecutor {
    async fn evaluate(
        &self,
        code: &str,
        data: &Value,
        raw_response: &str,
        timeout: Duration,
    ) -> Result<Value, EvalError> {
        screen(code, &JAVASCRIPT_RULES)?;

        let (code, data, raw_response) = (code.to_owned(), data.clone(), raw_response.to_owned());
        let deadline = Instant::now() + timeout;
        let task = tokio::task::spawn_blocking(move || Self::execute(&code, &data, &raw_response, deadline));

        // The interrupt handler normally fires first; the outer limit only guards against a stuck runtime.
        match tokio::time::timeout(timeout + Duration::from_millis(500), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(EvalError::Execution(format!("Parser execution failed: {}", e))),
            Err(_) => Err(EvalError::Timeout),
        }
    }
}

impl JavascriptExecutor {
    fn execute(
        code: &str,
        data: &Value,
        raw_response: &str,
        deadline: Instant,
    ) -> Result<Value, EvalError> {
        let runtime = JsRuntime::new().map_err(|e| EvalError::Execution(e.to_string()))?;
        runtime.set_memory_limit(JS_MEMORY_LIMIT);

        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = timed_out.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let expired = Instant::now() >= deadline;
            if expired {
                flag.store(true, Ordering::Relaxed);
            }
            expired
        })));

        let ctx = JsContext::full(&runtime).map_err(|e| EvalError::Execution(e.to_string()))?;

        ctx.with(|ctx| {
            let fail = |err: rquickjs::Error| -> EvalError {
                if timed_out.load(Ordering::Relaxed) {
                    debug!("javascript parser interrupted at deadline");
                    return EvalError::Timeout;
                }
                match err {
                    rquickjs::Error::Exception => {
                        let message = rquickjs::Exception::from_js(&ctx, ctx.catch()).ok().and_then(|e| e.message()).unwrap_or_default();
                        EvalError::Execution(format!("Parser execution failed: {}", message))
                    }
                    other => EvalError::Execution(format!("Parser execution failed: {}", other)),
                }
            };

            ctx.globals().set("raw_response", raw_response.to_owned()).map_err(&fail)?;
            ctx.eval::<(), _>(code).map_err(&fail)?;

            let defined: bool = ctx.eval("typeof parse === 'function'").map_err(&fail)?;
            if !defined {
                return Err(EvalError::Execution("Parser code must define a 'parse(data)' function".to_string()));
            }

            let data_json = serde_json::to_string(data).map_err(|e| EvalError::Execution(e.to_string()))?;
            let call_code = format!("(function() {{ const result = parse({}); return JSON.stringify(result === undefined ? null : result); }})()", data_json);
            let json_str: String = ctx.eval(call_code).map_err(&fail)?;
            serde_json::from_str(&json_str).map_err(|e| EvalError::Execution(e.to_string()))
        })
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use serde_json::json;

    use super::{CodeLanguage, EvalError, PythonExecutor, evaluate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_python_parse_doubles_value() {
        let code = "def parse(data):\n    return data[\"x\"] * 2\n";
        let result = evaluate(CodeLanguage::Python3, code, &json!({"x": 5}), "", TIMEOUT).await;
        assert_eq!(result, Ok(json!(10)));
    }

    #[tokio::test]
    async fn test_python_comprehension_and_builtins() {
        let code = r#"
def parse(data):
    names = [item["name"] for item in data["results"] if item["score"] > 1]
    return {"names": sorted(names), "count": len(names), "total": sum(i["score"] for i in data["results"])}
"#;
        let data = json!({"results": [{"name": "b", "score": 2}, {"name": "a", "score": 3}, {"name": "c", "score": 1}]});
        let result = evaluate(CodeLanguage::Python3, code, &data, "", TIMEOUT).await.unwrap();
        assert_eq!(result, json!({"names": ["a", "b"], "count": 2, "total": 6}));
    }

    #[tokio::test]
    async fn test_python_reads_raw_response() {
        let code = "def parse(data):\n    return raw_response.upper()\n";
        let result = evaluate(CodeLanguage::Python3, code, &json!(null), "plain body", TIMEOUT).await;
        assert_eq!(result, Ok(json!("PLAIN BODY")));
    }

    #[tokio::test]
    async fn test_blank_snippet_is_noop() {
        let data = json!({"keep": true});
        assert_eq!(evaluate(CodeLanguage::Python3, "  \n", &data, "", TIMEOUT).await, Ok(data.clone()));
        assert_eq!(evaluate(CodeLanguage::Javascript, "", &data, "", TIMEOUT).await, Ok(data));
    }

    #[tokio::test]
    async fn test_python_missing_parse_is_execution_error() {
        let result = evaluate(CodeLanguage::Python3, "def transform(data):\n    return data\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(result, Err(EvalError::Execution(msg)) if msg.contains("parse")));
    }

    #[tokio::test]
    async fn test_python_syntax_error_is_execution_error() {
        let result = evaluate(CodeLanguage::Python3, "def parse(data)\n    return 1\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(result, Err(EvalError::Execution(msg)) if msg.contains("Syntax error")));
    }

    #[tokio::test]
    async fn test_python_runtime_exception_is_execution_error() {
        let result = evaluate(CodeLanguage::Python3, "def parse(data):\n    return data['missing']\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(result, Err(EvalError::Execution(msg)) if msg.contains("KeyError")));
    }

    #[tokio::test]
    async fn test_python_dunder_access_is_rejected() {
        let code = "def parse(data):\n    return data.__class__\n";
        let result = evaluate(CodeLanguage::Python3, code, &json!({}), "", TIMEOUT).await;
        assert!(matches!(result, Err(EvalError::Security(_))));
    }

    #[tokio::test]
    async fn test_python_import_and_open_are_rejected() {
        let import = evaluate(CodeLanguage::Python3, "import os\ndef parse(data):\n    return 1\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(import, Err(EvalError::Security(_))));

        let open = evaluate(CodeLanguage::Python3, "def parse(data):\n    return open('/etc/passwd').read()\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(open, Err(EvalError::Security(_))));
    }

    #[tokio::test]
    async fn test_python_infinite_loop_times_out() {
        let code = "def parse(data):\n    while True:\n        pass\n";
        let start = Instant::now();
        let result = evaluate(CodeLanguage::Python3, code, &json!({}), "", Duration::from_secs(1)).await;
        assert_eq!(result, Err(EvalError::Timeout));
        assert!(start.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_python_runtime_built_attribute_names_are_rejected() {
        let code = "def parse(data):\n    u = '_' * 2\n    return ('{0.' + u + 'class' + u + '.' + u + 'mro' + u + '}').format(data)\n";
        let result = evaluate(CodeLanguage::Python3, code, &json!({}), "", TIMEOUT).await;
        assert!(matches!(result, Err(EvalError::Security(msg)) if msg.contains("format")));

        let mapped = evaluate(CodeLanguage::Python3, "def parse(data):\n    f = str.format_map\n    return f('{x}', data)\n", &json!({"x": 1}), "", TIMEOUT).await;
        assert!(matches!(mapped, Err(EvalError::Security(_))));

        let bare = evaluate(CodeLanguage::Python3, "def parse(data):\n    try:\n        return 1\n    except:\n        return 2\n", &json!({}), "", TIMEOUT).await;
        assert!(matches!(bare, Err(EvalError::Security(_))));
    }

    #[tokio::test]
    async fn test_python_timeout_stops_interpreter_thread() {
        let liveness = Arc::new(());
        let spinning = "def parse(data):\n    while True:\n        pass\n";
        let guarded = "def parse(data):\n    while True:\n        try:\n            pass\n        except Exception:\n            pass\n";
        for code in [spinning, guarded, spinning] {
            let start = Instant::now();
            let result = PythonExecutor::run(code, &json!({}), "", Duration::from_millis(300), liveness.clone()).await;
            assert_eq!(result, Err(EvalError::Timeout));
            assert!(start.elapsed() < Duration::from_secs(2));
        }
        assert_eq!(Arc::strong_count(&liveness), 1);
    }

    #[tokio::test]
    async fn test_javascript_parse() {
        let code = "function parse(data) { return { doubled: data.x * 2, raw: raw_response }; }";
        let result = evaluate(CodeLanguage::Javascript, code, &json!({"x": 4}), "body", TIMEOUT).await;
        assert_eq!(result, Ok(json!({"doubled": 8, "raw": "body"})));
    }

    #[tokio::test]
    async fn test_javascript_missing_parse_and_private_access() {
        let missing = evaluate(CodeLanguage::Javascript, "function main(data) { return data; }", &json!({}), "", TIMEOUT).await;
        assert!(matches!(missing, Err(EvalError::Execution(_))));

        let private = evaluate(CodeLanguage::Javascript, "function parse(data) { return data.__proto__; }", &json!({}), "", TIMEOUT).await;
        assert!(matches!(private, Err(EvalError::Security(_))));
    }

    #[tokio::test]
    async fn test_javascript_infinite_loop_times_out() {
        let start = Instant::now();
        let result = evaluate(CodeLanguage::Javascript, "function parse(data) { while (true) {} }", &json!({}), "", Duration::from_secs(1)).await;
        assert_eq!(result, Err(EvalError::Timeout));
        assert!(start.elapsed() <= Duration::from_secs(2));
    }
}
