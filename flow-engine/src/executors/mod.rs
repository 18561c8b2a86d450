//! Step executors, one per node kind.
//!
//! Executors never abort a run themselves: they report what happened in a
//! [`StepOutcome`] and the interpreter decides what the failure means.

pub mod api;
pub mod condition;
pub mod model;
pub mod telegram;
pub mod trigger;

use serde_json::{json, Value};

use crate::error::StepError;
use crate::model::Handle;

#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Outgoing handle to follow
    pub handle: Handle,
    /// Value stored under the node's `outputVariable`
    pub output: Option<Value>,
    /// Additional variables the step sets (condition branch variables)
    pub variables: Vec<(String, Value)>,
    /// What the step log shows as output; defaults to `output`
    pub report: Option<Value>,
    pub error: Option<StepError>,
}

impl StepOutcome {
    pub fn value(output: Value) -> Self {
        Self {
            handle: Handle::Default,
            output: Some(output),
            variables: Vec::new(),
            report: None,
            error: None,
        }
    }

    pub fn routed(handle: Handle) -> Self {
        Self {
            handle,
            output: None,
            variables: Vec::new(),
            report: None,
            error: None,
        }
    }

    /// Gated no-op that still follows the default edge
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::routed(Handle::Default).with_report(json!({ "skipped": reason.into() }))
    }

    pub fn failed(error: StepError) -> Self {
        Self {
            error: Some(error),
            ..Self::routed(Handle::Default)
        }
    }

    pub fn with_report(mut self, report: Value) -> Self {
        self.report = Some(report);
        self
    }

    pub fn log_output(&self) -> Option<Value> {
        self.report.clone().or_else(|| self.output.clone())
    }
}
