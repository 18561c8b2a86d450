//! Collaborators the engine consumes: graph store, HTTP, text completion,
//! message delivery, execution storage and token usage.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    ExecutionId, ExecutionRecord, ExecutionStatus, MessageButton, ModelTier, NewExecution,
    ParseMode, RawGraph, StepLog, StepLogId, Strategy, StrategyId,
};

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn load_strategy(&self, strategy_id: StrategyId) -> Result<Option<Strategy>>;

    async fn load_graph(&self, strategy_id: StrategyId) -> Result<RawGraph>;

    async fn list_enabled_strategies(&self) -> Result<Vec<Strategy>>;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpCapability: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

#[async_trait]
pub trait CompletionCapability: Send + Sync {
    async fn complete(&self, tier: ModelTier, system_prompt: &str, user_prompt: &str) -> Result<Completion>;
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: ParseMode,
    pub buttons: Vec<MessageButton>,
    /// Full alert (parse mode and interactive elements) versus a plain reminder
    pub formatted: bool,
    pub reply_to: Option<i64>,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Returns the delivered message id
    async fn send(&self, message: &OutboundMessage) -> Result<i64>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, execution: NewExecution) -> Result<ExecutionId>;

    /// Returns the id the store assigned to the log
    async fn append_step_log(&self, log: &StepLog) -> Result<StepLogId>;

    /// Moves a running execution to its terminal status. Fails if it is not running.
    async fn finalize_execution(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<()>;

    async fn list_executions(&self, strategy_id: StrategyId, limit: u64) -> Result<Vec<ExecutionRecord>>;

    async fn step_logs(&self, execution_id: ExecutionId) -> Result<Vec<StepLog>>;
}

/// Process-wide token accounting; the engine only forwards counts
#[async_trait]
pub trait UsageCounter: Send + Sync {
    async fn record(&self, tier: ModelTier, tokens: u64) -> Result<()>;
}
