//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "strategy_step_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub execution_id: u64,
    pub node_id: u64,
    pub node_type: String,
    #[sea_orm(column_type = "Json")]
    pub input: Json,
    #[sea_orm(column_type = "Json", nullable)]
    pub output: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::strategy_executions::Entity",
        from = "Column::ExecutionId",
        to = "super::strategy_executions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    StrategyExecutions,
}

impl Related<super::strategy_executions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyExecutions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
