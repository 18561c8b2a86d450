//! SignalFlow flow engine: executes per-strategy node graphs
//!
//! A strategy owns a directed graph of typed nodes (API calls, model calls,
//! conditions, sub-strategy triggers and Telegram messages). One run walks
//! the graph from its entry nodes, threads a shared variable environment
//! through every step and records a step log per executed node.
//!
//! # Features
//!
//! - **Graph building**: validation, cycle detection and legacy ordered chains
//! - **Executors**: one per node kind, dispatched by a single `match`
//! - **Notification dedup**: reminders instead of duplicate alerts inside a window
//! - **Sub-strategies**: blocking or detached, guarded against cycles
//!
//! # Example
//!
//! ```no_run
//! use flow_engine::prelude::*;
//!
//! async fn run_once(interpreter: &FlowInterpreter) -> Result<(), FlowError> {
//!     let result = interpreter.execute(42, TriggerKind::Manual).await?;
//!     println!("execution {} success={}", result.execution_id, result.success);
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod dispatcher;
pub mod error;
pub mod executors;
pub mod graph;
pub mod http;
pub mod interpreter;
pub mod memory;
pub mod model;
pub mod recorder;
pub mod variables;

// Re-export commonly used types
pub mod prelude {
    pub use crate::capabilities::*;
    pub use crate::dispatcher::{DedupRecord, DedupStore, DedupWindow, Delivery, DispatchOutcome, NotificationDispatcher};
    pub use crate::error::{FlowError, StepError};
    pub use crate::graph::FlowGraph;
    pub use crate::http::ReqwestHttp;
    pub use crate::interpreter::{EngineConfig, EngineDeps, ExecutionRequest, FlowInterpreter};
    pub use crate::model::*;
    pub use crate::variables::{VariableEnvironment, VariableSource};
}
