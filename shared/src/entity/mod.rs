//! `SeaORM` entities for the flow tables

pub mod strategies;
pub mod strategy_edges;
pub mod strategy_executions;
pub mod strategy_nodes;
pub mod strategy_step_logs;
