//! Error taxonomy of the flow engine

use thiserror::Error;

use crate::model::{NodeId, StrategyId};

/// Errors that change the outcome of a whole run.
///
/// Per-node failures that do not abort anything are [`StepError`]s instead.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Empty, cyclic or malformed graph. Raised before any node executes.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A StrategyTrigger targeted a strategy already on the call stack.
    #[error("cyclic trigger: strategy {target} is already executing (call stack: {stack:?})")]
    CyclicTrigger {
        target: StrategyId,
        stack: Vec<StrategyId>,
    },

    #[error("trigger depth {depth} exceeds the limit of {limit}")]
    TriggerDepth { depth: usize, limit: usize },

    /// A `required` node or a malformed condition failed.
    #[error("node {node_id} failed: {message}")]
    FatalNode { node_id: NodeId, message: String },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl FlowError {
    pub fn config(message: impl Into<String>) -> Self {
        FlowError::Configuration(message.into())
    }
}

/// Failure of a single step, recorded in its step log.
#[derive(Debug, Clone, PartialEq)]
pub struct StepError {
    pub message: String,
    pub fatal: bool,
}

impl StepError {
    pub fn soft(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<FlowError> for StepError {
    fn from(err: FlowError) -> Self {
        StepError::soft(err.to_string())
    }
}
