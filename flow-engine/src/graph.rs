//! In-memory flow graph built once per run from the store's flat rows
//!
//! Nodes live in an arena (`Vec<FlowNode>`) ordered by `(order_index, id)`;
//! routes are keyed by `(arena index, handle)` so traversal never goes back
//! to the store.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::FlowError;
use crate::model::{FlowNode, Handle, NodeId, NodeKind, RawGraph, StrategyId};

#[derive(Debug, Clone)]
pub struct FlowGraph {
    strategy_id: StrategyId,
    nodes: Vec<FlowNode>,
    index: HashMap<NodeId, usize>,
    routes: HashMap<(usize, Handle), Vec<usize>>,
    entries: Vec<usize>,
    /// Every variable name some node of the graph writes
    declared: HashSet<String>,
}

impl FlowGraph {
    pub fn build(strategy_id: StrategyId, raw: RawGraph) -> Result<Self, FlowError> {
        if raw.nodes.is_empty() {
            return Err(FlowError::config(format!(
                "strategy {} has no nodes",
                strategy_id
            )));
        }

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for record in raw.nodes {
            if record.strategy_id != strategy_id {
                return Err(FlowError::config(format!(
                    "node {} belongs to strategy {}, not {}",
                    record.id, record.strategy_id, strategy_id
                )));
            }
            nodes.push(FlowNode::from_record(record)?);
        }
        nodes.sort_by_key(|n| (n.order_index, n.id));

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(FlowError::config(format!("duplicate node id {}", node.id)));
            }
        }

        let mut routes: HashMap<(usize, Handle), Vec<usize>> = HashMap::new();
        let legacy = raw.edges.is_empty();

        if legacy {
            // Ungraphed strategy: one implicit default chain in (order_index, id) order
            for i in 1..nodes.len() {
                routes.insert((i - 1, Handle::Default), vec![i]);
            }
        } else {
            for edge in &raw.edges {
                if edge.strategy_id != strategy_id {
                    return Err(FlowError::config(format!(
                        "edge {} -> {} belongs to strategy {}",
                        edge.source_node_id, edge.target_node_id, edge.strategy_id
                    )));
                }
                let source = *index.get(&edge.source_node_id).ok_or_else(|| {
                    FlowError::config(format!("edge source node {} does not exist", edge.source_node_id))
                })?;
                let target = *index.get(&edge.target_node_id).ok_or_else(|| {
                    FlowError::config(format!("edge target node {} does not exist", edge.target_node_id))
                })?;
                let handle = Handle::parse(edge.source_handle.as_deref())?;
                if handle != Handle::Default && !matches!(nodes[source].kind, NodeKind::Condition(_)) {
                    return Err(FlowError::config(format!(
                        "node {} is not a condition and has no '{:?}' handle",
                        edge.source_node_id, handle
                    )));
                }
                routes.entry((source, handle)).or_default().push(target);
            }
        }

        let in_degree = in_degrees(nodes.len(), &routes);
        if has_cycle(nodes.len(), &routes, &in_degree) {
            return Err(FlowError::config(format!(
                "graph of strategy {} contains a cycle",
                strategy_id
            )));
        }

        let entries: Vec<usize> = if legacy {
            vec![0]
        } else {
            let starts: Vec<usize> = nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| matches!(n.kind, NodeKind::Start))
                .map(|(i, _)| i)
                .collect();
            if starts.is_empty() {
                (0..nodes.len()).filter(|i| in_degree[*i] == 0).collect()
            } else {
                starts
            }
        };
        if entries.is_empty() {
            return Err(FlowError::config(format!(
                "strategy {} has no entry node",
                strategy_id
            )));
        }

        if !nodes
            .iter()
            .any(|n| n.enabled && !matches!(n.kind, NodeKind::Start))
        {
            return Err(FlowError::config(format!(
                "strategy {} has no enabled steps",
                strategy_id
            )));
        }

        let declared = nodes
            .iter()
            .flat_map(|n| n.declared_variables())
            .map(str::to_string)
            .collect();

        Ok(Self {
            strategy_id,
            nodes,
            index,
            routes,
            entries,
            declared,
        })
    }

    pub fn strategy_id(&self) -> StrategyId {
        self.strategy_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &FlowNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Names written by nodes of this graph, whether or not they ran
    pub fn declared_variables(&self) -> &HashSet<String> {
        &self.declared
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }

    /// Targets wired to exactly `(idx, handle)`, in edge-list order
    pub fn targets(&self, idx: usize, handle: Handle) -> &[usize] {
        self.routes
            .get(&(idx, handle))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Next nodes after `idx` emitted `handle`.
    ///
    /// A condition branch with no edge of its own falls back to the node's
    /// default edges.
    pub fn route(&self, idx: usize, handle: Handle) -> &[usize] {
        let targets = self.targets(idx, handle);
        if targets.is_empty() && handle != Handle::Default {
            return self.targets(idx, Handle::Default);
        }
        targets
    }
}

fn in_degrees(len: usize, routes: &HashMap<(usize, Handle), Vec<usize>>) -> Vec<usize> {
    let mut in_degree = vec![0usize; len];
    for targets in routes.values() {
        for &t in targets {
            in_degree[t] += 1;
        }
    }
    in_degree
}

fn has_cycle(len: usize, routes: &HashMap<(usize, Handle), Vec<usize>>, in_degree: &[usize]) -> bool {
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (&(source, _), targets) in routes {
        outgoing[source].extend(targets.iter().copied());
    }

    let mut remaining = in_degree.to_vec();
    let mut queue: VecDeque<usize> = (0..len).filter(|i| remaining[*i] == 0).collect();
    let mut visited = 0;
    while let Some(n) = queue.pop_front() {
        visited += 1;
        for &t in &outgoing[n] {
            remaining[t] -= 1;
            if remaining[t] == 0 {
                queue.push_back(t);
            }
        }
    }
    visited != len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeRecord, NodeRecord};
    use serde_json::json;

    fn node(id: NodeId, node_type: &str, order_index: i32) -> NodeRecord {
        let config = match node_type {
            "api" => json!({"url": "https://example.com"}),
            "condition" => json!({"left": "x", "operator": ">", "right": "1"}),
            _ => json!({}),
        };
        NodeRecord {
            id,
            strategy_id: 1,
            node_type: node_type.to_string(),
            label: None,
            config,
            output_variable: None,
            enabled: true,
            required: false,
            order_index,
        }
    }

    fn edge(source: NodeId, handle: Option<&str>, target: NodeId) -> EdgeRecord {
        EdgeRecord {
            strategy_id: 1,
            source_node_id: source,
            source_handle: handle.map(String::from),
            target_node_id: target,
        }
    }

    #[test]
    fn test_empty_graph_is_a_configuration_error() {
        let err = FlowGraph::build(1, RawGraph::default()).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }

    #[test]
    fn test_legacy_chain_orders_by_index_then_id() {
        let raw = RawGraph {
            nodes: vec![node(30, "api", 2), node(20, "api", 1), node(10, "api", 1)],
            edges: vec![],
        };
        let graph = FlowGraph::build(1, raw).unwrap();

        let mut order = vec![graph.node(graph.entries()[0]).id];
        let mut current = graph.entries()[0];
        while let Some(&next) = graph.route(current, Handle::Default).first() {
            order.push(graph.node(next).id);
            current = next;
        }
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn test_start_node_is_the_entry() {
        let raw = RawGraph {
            nodes: vec![node(1, "api", 0), node(2, "start", 5), node(3, "api", 1)],
            edges: vec![edge(2, None, 1), edge(1, Some("default"), 3)],
        };
        let graph = FlowGraph::build(1, raw).unwrap();
        let entries: Vec<NodeId> = graph.entries().iter().map(|i| graph.node(*i).id).collect();
        assert_eq!(entries, vec![2]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let raw = RawGraph {
            nodes: vec![node(1, "api", 0), node(2, "api", 1)],
            edges: vec![edge(1, None, 2), edge(2, None, 1)],
        };
        assert!(matches!(FlowGraph::build(1, raw), Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let raw = RawGraph {
            nodes: vec![node(1, "api", 0)],
            edges: vec![edge(1, None, 99)],
        };
        assert!(matches!(FlowGraph::build(1, raw), Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_condition_branch_falls_back_to_default_edges() {
        let raw = RawGraph {
            nodes: vec![node(1, "condition", 0), node(2, "api", 1), node(3, "api", 2)],
            edges: vec![edge(1, Some("true"), 2), edge(1, None, 3)],
        };
        let graph = FlowGraph::build(1, raw).unwrap();
        let cond = graph.index_of(1).unwrap();
        assert_eq!(graph.route(cond, Handle::True), &[graph.index_of(2).unwrap()]);
        assert_eq!(graph.route(cond, Handle::False), &[graph.index_of(3).unwrap()]);
    }

    #[test]
    fn test_true_handle_on_api_node_is_rejected() {
        let raw = RawGraph {
            nodes: vec![node(1, "api", 0), node(2, "api", 1)],
            edges: vec![edge(1, Some("true"), 2)],
        };
        assert!(FlowGraph::build(1, raw).is_err());
    }

    #[test]
    fn test_declared_variables_cover_outputs_and_branches() {
        let mut api = node(1, "api", 0);
        api.output_variable = Some("price".to_string());
        let mut cond = node(2, "condition", 1);
        cond.config = json!({
            "left": "price", "operator": ">", "right": "1",
            "trueVariable": "highPrice", "falseVariable": " "
        });
        let graph = FlowGraph::build(1, RawGraph { nodes: vec![api, cond], edges: vec![] }).unwrap();

        let mut names: Vec<&str> = graph.declared_variables().iter().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, vec!["highPrice", "price"]);
    }
}
