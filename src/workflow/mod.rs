//! Multi-step workflows: ordered template calls whose inputs may reference earlier steps' output.

mod engine;
mod expression;
mod registry;

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::Result;

pub use engine::WorkflowEngine;
pub use expression::Expression;
pub use registry::WorkflowRegistry;

const DEFAULT_RETRY: u32 = 3;

/// Whole-second bounds for back-off and pacing sleeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepRange {
    pub min: i64,
    pub max: i64,
}

impl SleepRange {
    /// A uniformly random whole-second duration in `[min, max]`. Zero when `max <= 0`.
    pub fn pick(&self) -> Duration {
        if self.max <= 0 {
            return Duration::ZERO;
        }
        let min = self.min.max(0);
        let max = self.max.max(min);
        Duration::from_secs(rand::rng().random_range(min..=max) as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub template_name: String,
    pub input: Vec<(String, Expression)>,
    /// output key -> path, a leading `$.` already stripped
    pub extract: Vec<(String, String)>,
    pub retry: u32,
    pub sleep: SleepRange,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowDefinition {
    pub description: String,
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
struct RawDefinition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    name: Option<String>,
    template_name: String,
    #[serde(default)]
    input: Map<String, Value>,
    #[serde(default)]
    extract: Option<Map<String, Value>>,
    retry: Option<u32>,
    sleep: Option<RawSleep>,
}

#[derive(Deserialize, Default)]
struct RawSleep {
    min: Option<i64>,
    max: Option<i64>,
}

impl WorkflowDefinition {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["steps"],
            "properties": {
                "description": { "type": ["string", "null"] },
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["template_name"],
                        "properties": {
                            "name": { "type": ["string", "null"] },
                            "template_name": { "type": "string", "minLength": 1 },
                            "input": {
                                "type": ["object", "null"],
                                "description": "param name -> literal, `$random(lo,hi)` or `$.path` into the workflow context"
                            },
                            "extract": {
                                "type": ["object", "null"],
                                "additionalProperties": { "type": "string" }
                            },
                            "retry": { "type": ["integer", "null"], "minimum": 0 },
                            "sleep": {
                                "type": ["object", "null"],
                                "properties": {
                                    "min": { "type": ["integer", "null"] },
                                    "max": { "type": ["integer", "null"] }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    /// Validates `value` against [`Self::schema`] and parses every input expression.
    pub fn from_value(value: &Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), value)?;
        let raw: RawDefinition = serde_json::from_value(value.clone())?;

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(idx, step)| {
                let sleep = step.sleep.unwrap_or_default();
                Step {
                    name: step.name.filter(|n| !n.is_empty()).unwrap_or_else(|| format!("step{}", idx + 1)),
                    template_name: step.template_name,
                    input: step.input.iter().map(|(k, v)| (k.clone(), Expression::parse(v))).collect(),
                    extract: step
                        .extract
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|(k, v)| v.as_str().map(|p| (k, p.strip_prefix("$.").unwrap_or(p).to_string())))
                        .collect(),
                    retry: step.retry.filter(|r| *r > 0).unwrap_or(DEFAULT_RETRY),
                    sleep: SleepRange {
                        min: sleep.min.unwrap_or(0),
                        max: sleep.max.unwrap_or(0),
                    },
                }
            })
            .collect();

        Ok(Self {
            description: raw.description,
            steps,
        })
    }
}
