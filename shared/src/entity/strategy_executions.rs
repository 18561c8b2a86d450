//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "strategy_executions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub strategy_id: u64,
    #[sea_orm(nullable)]
    pub parent_execution_id: Option<u64>,
    /// `cron` or `manual`
    pub trigger_type: String,
    /// `running`, `success` or `failed`
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub started_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::strategies::Entity",
        from = "Column::StrategyId",
        to = "super::strategies::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Strategies,
    #[sea_orm(has_many = "super::strategy_step_logs::Entity")]
    StrategyStepLogs,
}

impl Related<super::strategies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Strategies.def()
    }
}

impl Related<super::strategy_step_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyStepLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
