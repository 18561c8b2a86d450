use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use flow_engine::capabilities::GraphStore;
use flow_engine::model::{EdgeRecord, NodeRecord, RawGraph, Strategy, StrategyId};
use sea_orm::prelude::*;
use sea_orm::QueryOrder;
use shared::entity::{strategies, strategy_edges, strategy_nodes};

pub struct GraphRepository {
    db: Arc<DatabaseConnection>,
}

impl GraphRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_all(&self) -> Result<Vec<Strategy>> {
        let strategies = strategies::Entity::find()
            .order_by_asc(strategies::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(strategies.into_iter().map(to_strategy).collect())
    }
}

fn to_strategy(model: strategies::Model) -> Strategy {
    Strategy {
        id: model.id,
        name: model.name,
        enabled: model.enabled,
        schedule: model.schedule,
        trigger_metadata: model.trigger_metadata,
    }
}

fn to_node(model: strategy_nodes::Model) -> NodeRecord {
    NodeRecord {
        id: model.id,
        strategy_id: model.strategy_id,
        node_type: model.node_type,
        label: model.label,
        config: model.config,
        output_variable: model.output_variable,
        enabled: model.enabled,
        required: model.required,
        order_index: model.order_index,
    }
}

fn to_edge(model: strategy_edges::Model) -> EdgeRecord {
    EdgeRecord {
        strategy_id: model.strategy_id,
        source_node_id: model.source_node_id,
        source_handle: model.source_handle,
        target_node_id: model.target_node_id,
    }
}

#[async_trait]
impl GraphStore for GraphRepository {
    async fn load_strategy(&self, strategy_id: StrategyId) -> Result<Option<Strategy>> {
        let strategy = strategies::Entity::find_by_id(strategy_id)
            .one(self.db.as_ref())
            .await?;
        Ok(strategy.map(to_strategy))
    }

    async fn load_graph(&self, strategy_id: StrategyId) -> Result<RawGraph> {
        let nodes = strategy_nodes::Entity::find()
            .filter(strategy_nodes::Column::StrategyId.eq(strategy_id))
            .order_by_asc(strategy_nodes::Column::OrderIndex)
            .order_by_asc(strategy_nodes::Column::Id)
            .all(self.db.as_ref())
            .await?;
        let edges = strategy_edges::Entity::find()
            .filter(strategy_edges::Column::StrategyId.eq(strategy_id))
            .order_by_asc(strategy_edges::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(RawGraph {
            nodes: nodes.into_iter().map(to_node).collect(),
            edges: edges.into_iter().map(to_edge).collect(),
        })
    }

    async fn list_enabled_strategies(&self) -> Result<Vec<Strategy>> {
        let strategies = strategies::Entity::find()
            .filter(strategies::Column::Enabled.eq(true))
            .order_by_asc(strategies::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(strategies.into_iter().map(to_strategy).collect())
    }
}
