//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "strategies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: u64,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub enabled: bool,
    /// Cron expression; strategies without one only run on demand
    #[sea_orm(nullable)]
    pub schedule: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub trigger_metadata: Option<Json>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::strategy_nodes::Entity")]
    StrategyNodes,
    #[sea_orm(has_many = "super::strategy_edges::Entity")]
    StrategyEdges,
    #[sea_orm(has_many = "super::strategy_executions::Entity")]
    StrategyExecutions,
}

impl Related<super::strategy_nodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyNodes.def()
    }
}

impl Related<super::strategy_edges::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyEdges.def()
    }
}

impl Related<super::strategy_executions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StrategyExecutions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
