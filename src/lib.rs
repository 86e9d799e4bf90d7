//! # Scrapeflow
//!
//! Scrapeflow is a template-driven HTTP scraping engine written in Rust.
//! It turns stored request templates plus caller parameters into outbound calls and composes them into larger runs.
//!
//! ## Core Features
//!
//! - **Request Templates**: Defaults, form or JSON bodies, cookie/header-group/proxy attachments
//! - **Extraction**: Dot/bracket paths or sandboxed Python/JavaScript `parse(data)` snippets
//! - **Workflows**: Ordered steps with `$.path` / `$random(lo,hi)` inputs, retry and randomized back-off
//! - **Batch Runs**: One call per CSV row under a concurrency limit, with cancellation and JSON artifacts
//! - **Pluggable Storage**: Supports in-memory storage (testing) and PostgreSQL (production)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scrapeflow::{Config, EngineBuilder};
//!
//! let engine = EngineBuilder::new().config(Config::create("scrapeflow.toml")?).build()?;
//!
//! let result = engine.call_template("search", &params).await?;
//! engine.deploy_workflow("export", &definition)?;
//! let result = engine.execute_workflow("export", &params).await;
//! let result = engine.call("search", &params).await;
//! ```

mod batch;
mod builder;
mod config;
mod engine;
mod error;
pub mod extract;
pub mod notify;
mod request;
pub mod store;
mod utils;
mod workflow;

#[cfg(test)]
mod testkit;

use std::sync::{Arc, RwLock};

pub use batch::{RunSummary, artifact, parse_rows};
pub use builder::EngineBuilder;
pub use config::{Config, HttpConfig, PostgresConfig, SandboxConfig, StoreConfig, StoreType};
pub use engine::Engine;
pub use error::ScrapeflowError;
pub use extract::{CodeLanguage, EvalError, Extraction};
pub use request::{CallResult, HttpMethod, ResolvedRequest, compile};
pub use workflow::{Expression, SleepRange, Step, WorkflowDefinition};

/// Result type alias for Scrapeflow operations.
pub type Result<T> = std::result::Result<T, ScrapeflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
