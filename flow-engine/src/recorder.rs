//! Execution record and step-log persistence for one run

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, warn};

use crate::capabilities::ExecutionStore;
use crate::error::FlowError;
use crate::model::{ExecutionId, ExecutionStatus, FlowNode, NewExecution, StepLog};

/// Owns the lifecycle of one Execution Record.
///
/// `finish` consumes the recorder, so a record is finalized exactly once.
pub struct ExecutionRecorder {
    store: Arc<dyn ExecutionStore>,
    execution_id: ExecutionId,
    logs: Vec<StepLog>,
}

impl ExecutionRecorder {
    pub async fn begin(store: Arc<dyn ExecutionStore>, execution: NewExecution) -> Result<Self, FlowError> {
        let execution_id = store.create_execution(execution).await?;
        Ok(Self {
            store,
            execution_id,
            logs: Vec::new(),
        })
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub async fn record(
        &mut self,
        node: &FlowNode,
        input: Value,
        output: Option<Value>,
        error: Option<String>,
        duration: Duration,
    ) {
        let mut log = StepLog {
            id: None,
            execution_id: self.execution_id,
            node_id: node.id,
            node_kind: node.kind.name().to_string(),
            input,
            output,
            error,
            duration_ms: duration.as_millis() as u64,
            created_at: Utc::now(),
        };
        match self.store.append_step_log(&log).await {
            Ok(id) => log.id = Some(id),
            Err(e) => warn!(
                execution_id = self.execution_id,
                node_id = node.id,
                "Failed to persist step log: {:#}",
                e
            ),
        }
        self.logs.push(log);
    }

    /// Finalize the record and hand back the logs collected in this run
    pub async fn finish(self, fatal_error: Option<&str>) -> Vec<StepLog> {
        let status = if fatal_error.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Success
        };
        if let Err(e) = self
            .store
            .finalize_execution(self.execution_id, status, fatal_error.map(str::to_string))
            .await
        {
            error!(
                execution_id = self.execution_id,
                status = status.as_str(),
                "Failed to finalize execution: {:#}",
                e
            );
        }
        self.logs
    }
}
