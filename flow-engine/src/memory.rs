//! In-memory implementations of the storage collaborators.
//!
//! Used by the test-suite and whenever the runtime is started without a
//! database or Redis behind it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::capabilities::{ExecutionStore, GraphStore, UsageCounter};
use crate::dispatcher::{DedupRecord, DedupStore};
use crate::model::{
    ExecutionId, ExecutionRecord, ExecutionStatus, ModelTier, NewExecution, RawGraph, StepLog,
    StepLogId, Strategy, StrategyId,
};

#[derive(Default)]
pub struct InMemoryGraphStore {
    strategies: RwLock<HashMap<StrategyId, (Strategy, RawGraph)>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, strategy: Strategy, graph: RawGraph) {
        let mut strategies = self.strategies.write().await;
        strategies.insert(strategy.id, (strategy, graph));
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn load_strategy(&self, strategy_id: StrategyId) -> Result<Option<Strategy>> {
        let strategies = self.strategies.read().await;
        Ok(strategies.get(&strategy_id).map(|(s, _)| s.clone()))
    }

    async fn load_graph(&self, strategy_id: StrategyId) -> Result<RawGraph> {
        let strategies = self.strategies.read().await;
        Ok(strategies
            .get(&strategy_id)
            .map(|(_, g)| g.clone())
            .unwrap_or_default())
    }

    async fn list_enabled_strategies(&self) -> Result<Vec<Strategy>> {
        let strategies = self.strategies.read().await;
        let mut enabled: Vec<Strategy> = strategies
            .values()
            .filter(|(s, _)| s.enabled)
            .map(|(s, _)| s.clone())
            .collect();
        enabled.sort_by_key(|s| s.id);
        Ok(enabled)
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    next_id: AtomicU64,
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    logs: RwLock<Vec<StepLog>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn execution(&self, execution_id: ExecutionId) -> Option<ExecutionRecord> {
        self.executions.read().await.get(&execution_id).cloned()
    }

    pub async fn all_executions(&self) -> Vec<ExecutionRecord> {
        let mut all: Vec<ExecutionRecord> = self.executions.read().await.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        all
    }

    pub async fn all_logs(&self) -> Vec<StepLog> {
        self.logs.read().await.clone()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create_execution(&self, execution: NewExecution) -> Result<ExecutionId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ExecutionRecord {
            id,
            strategy_id: execution.strategy_id,
            parent_execution_id: execution.parent_execution_id,
            trigger: execution.trigger,
            status: ExecutionStatus::Running,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.executions.write().await.insert(id, record);
        Ok(id)
    }

    async fn append_step_log(&self, log: &StepLog) -> Result<StepLogId> {
        if !self.executions.read().await.contains_key(&log.execution_id) {
            bail!("execution {} does not exist", log.execution_id);
        }
        let mut logs = self.logs.write().await;
        let id = logs.len() as StepLogId + 1;
        logs.push(StepLog {
            id: Some(id),
            ..log.clone()
        });
        Ok(id)
    }

    async fn finalize_execution(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<()> {
        if status == ExecutionStatus::Running {
            bail!("cannot finalize execution {} as running", execution_id);
        }
        let mut executions = self.executions.write().await;
        let Some(record) = executions.get_mut(&execution_id) else {
            bail!("execution {} does not exist", execution_id);
        };
        if record.status != ExecutionStatus::Running {
            bail!(
                "execution {} is already {}",
                execution_id,
                record.status.as_str()
            );
        }
        record.status = status;
        record.error = error;
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn list_executions(&self, strategy_id: StrategyId, limit: u64) -> Result<Vec<ExecutionRecord>> {
        let executions = self.executions.read().await;
        let mut found: Vec<ExecutionRecord> = executions
            .values()
            .filter(|e| e.strategy_id == strategy_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn step_logs(&self, execution_id: ExecutionId) -> Result<Vec<StepLog>> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|l| l.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

/// Dedup records without expiry; the dispatcher's window check decides reuse
#[derive(Default)]
pub struct InMemoryDedupStore {
    records: RwLock<HashMap<String, DedupRecord>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Overwrite a record, e.g. to age it past its window
    pub async fn insert(&self, record: DedupRecord) {
        self.records.write().await.insert(record.fingerprint.clone(), record);
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<DedupRecord>> {
        Ok(self.records.read().await.get(fingerprint).cloned())
    }

    async fn put(&self, record: &DedupRecord, _ttl: Duration) -> Result<()> {
        self.insert(record.clone()).await;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUsageCounter {
    cheap: AtomicU64,
    deep: AtomicU64,
}

impl InMemoryUsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self, tier: ModelTier) -> u64 {
        match tier {
            ModelTier::Cheap => self.cheap.load(Ordering::SeqCst),
            ModelTier::Deep => self.deep.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl UsageCounter for InMemoryUsageCounter {
    async fn record(&self, tier: ModelTier, tokens: u64) -> Result<()> {
        match tier {
            ModelTier::Cheap => self.cheap.fetch_add(tokens, Ordering::SeqCst),
            ModelTier::Deep => self.deep.fetch_add(tokens, Ordering::SeqCst),
        };
        Ok(())
    }
}
