use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use flow_engine::capabilities::ExecutionStore;
use flow_engine::model::{
    ExecutionId, ExecutionRecord, ExecutionStatus, NewExecution, StepLog, StepLogId, StrategyId,
    TriggerKind,
};
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, QuerySelect, Set};
use shared::entity::{strategy_executions, strategy_step_logs};

pub struct ExecutionRepository {
    db: Arc<DatabaseConnection>,
}

impl ExecutionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_record(model: strategy_executions::Model) -> ExecutionRecord {
    ExecutionRecord {
        id: model.id,
        strategy_id: model.strategy_id,
        parent_execution_id: model.parent_execution_id,
        trigger: TriggerKind::parse(&model.trigger_type).unwrap_or(TriggerKind::Manual),
        status: ExecutionStatus::parse(&model.status).unwrap_or(ExecutionStatus::Failed),
        error: model.error,
        started_at: model.started_at,
        completed_at: model.completed_at,
    }
}

fn to_step_log(model: strategy_step_logs::Model) -> StepLog {
    StepLog {
        id: Some(model.id),
        execution_id: model.execution_id,
        node_id: model.node_id,
        node_kind: model.node_type,
        input: model.input,
        output: model.output,
        error: model.error,
        duration_ms: model.duration_ms,
        created_at: model.created_at,
    }
}

#[async_trait]
impl ExecutionStore for ExecutionRepository {
    async fn create_execution(&self, execution: NewExecution) -> Result<ExecutionId> {
        let row = strategy_executions::ActiveModel {
            strategy_id: Set(execution.strategy_id),
            parent_execution_id: Set(execution.parent_execution_id),
            trigger_type: Set(execution.trigger.as_str().to_string()),
            status: Set(ExecutionStatus::Running.as_str().to_string()),
            error: Set(None),
            started_at: Set(Utc::now()),
            completed_at: Set(None),
            ..Default::default()
        };
        let inserted = strategy_executions::Entity::insert(row)
            .exec(self.db.as_ref())
            .await?;
        Ok(inserted.last_insert_id)
    }

    async fn append_step_log(&self, log: &StepLog) -> Result<StepLogId> {
        let row = strategy_step_logs::ActiveModel {
            execution_id: Set(log.execution_id),
            node_id: Set(log.node_id),
            node_type: Set(log.node_kind.clone()),
            input: Set(log.input.clone()),
            output: Set(log.output.clone()),
            error: Set(log.error.clone()),
            duration_ms: Set(log.duration_ms),
            created_at: Set(log.created_at),
            ..Default::default()
        };
        let inserted = strategy_step_logs::Entity::insert(row)
            .exec(self.db.as_ref())
            .await?;
        Ok(inserted.last_insert_id)
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
        let updated = strategy_executions::Entity::update_many()
            .col_expr(strategy_executions::Column::Status, Expr::value(status.as_str()))
            .col_expr(strategy_executions::Column::Error, Expr::value(error))
            .col_expr(strategy_executions::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(strategy_executions::Column::Id.eq(execution_id))
            .filter(strategy_executions::Column::Status.eq(ExecutionStatus::Running.as_str()))
            .exec(self.db.as_ref())
            .await?;
        if updated.rows_affected == 0 {
            bail!("execution {} is not running", execution_id);
        }
        Ok(())
    }

    async fn list_executions(&self, strategy_id: StrategyId, limit: u64) -> Result<Vec<ExecutionRecord>> {
        let executions = strategy_executions::Entity::find()
            .filter(strategy_executions::Column::StrategyId.eq(strategy_id))
            .order_by_desc(strategy_executions::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(executions.into_iter().map(to_record).collect())
    }

    async fn step_logs(&self, execution_id: ExecutionId) -> Result<Vec<StepLog>> {
        let logs = strategy_step_logs::Entity::find()
            .filter(strategy_step_logs::Column::ExecutionId.eq(execution_id))
            .order_by_asc(strategy_step_logs::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(logs.into_iter().map(to_step_log).collect())
    }
}
