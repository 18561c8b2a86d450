//! Strategy, graph and execution data types

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;
use crate::variables::template_keys;

pub type StrategyId = u64;
pub type NodeId = u64;
pub type ExecutionId = u64;
pub type StepLogId = u64;

/// A named, schedulable automation unit owning one flow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    pub enabled: bool,
    pub schedule: Option<String>,
    pub trigger_metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Cron,
    Manual,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Cron => "cron",
            TriggerKind::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cron" => Some(TriggerKind::Cron),
            "manual" => Some(TriggerKind::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(ExecutionStatus::Running),
            "success" => Some(ExecutionStatus::Success),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// Named outgoing port of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    Default,
    True,
    False,
}

impl Handle {
    pub fn parse(value: Option<&str>) -> Result<Self, FlowError> {
        let value = value.map(|v| v.trim().to_lowercase()).unwrap_or_default();
        match value.as_str() {
            "" | "default" => Ok(Handle::Default),
            "true" => Ok(Handle::True),
            "false" => Ok(Handle::False),
            other => Err(FlowError::config(format!("unknown edge handle '{}'", other))),
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Handle::True
        } else {
            Handle::False
        }
    }
}

/// Flat node row as produced by the graph store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub strategy_id: StrategyId,
    pub node_type: String,
    pub label: Option<String>,
    pub config: Value,
    pub output_variable: Option<String>,
    pub enabled: bool,
    pub required: bool,
    pub order_index: i32,
}

/// Flat edge row as produced by the graph store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub strategy_id: StrategyId,
    pub source_node_id: NodeId,
    pub source_handle: Option<String>,
    pub target_node_id: NodeId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Cheap,
    Deep,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Cheap => "cheap",
            ModelTier::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default, alias = "responsePath", alias = "jsonPath")]
    pub extract_path: Option<String>,
    #[serde(default)]
    pub cast_to_number: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default, alias = "model")]
    pub tier: ModelTier,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(alias = "prompt")]
    pub user_prompt: String,
    #[serde(default)]
    pub include_api_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    ApiResult,
    ModelResponse,
    #[default]
    VariableValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Operator {
    #[serde(rename = "==", alias = "eq", alias = "equals")]
    Eq,
    #[serde(rename = "!=", alias = "ne", alias = "not_equals")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith", alias = "starts_with")]
    StartsWith,
    #[serde(rename = "endsWith", alias = "ends_with")]
    EndsWith,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    #[serde(default, alias = "conditionType", alias = "kind")]
    pub condition_type: ConditionKind,
    #[serde(default, alias = "leftOperand", deserialize_with = "de_stringish")]
    pub left: String,
    pub operator: Operator,
    #[serde(default, alias = "rightOperand", deserialize_with = "de_stringish")]
    pub right: String,
    #[serde(default, alias = "trueOutputVariable")]
    pub true_variable: Option<String>,
    #[serde(default, alias = "falseOutputVariable")]
    pub false_variable: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyTriggerConfig {
    #[serde(deserialize_with = "de_id")]
    pub target_strategy_id: StrategyId,
    #[serde(default)]
    pub condition_variable: Option<String>,
    #[serde(default, alias = "passVariables")]
    pub forward_variables: Vec<String>,
    #[serde(default)]
    pub wait_for_completion: bool,
    #[serde(default)]
    pub include_variables: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Html,
    Markdown,
    MarkdownV2,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    #[serde(deserialize_with = "de_stringish")]
    pub chat_id: String,
    #[serde(alias = "message")]
    pub template: String,
    #[serde(default)]
    pub include_api_data: bool,
    #[serde(default)]
    pub only_if_variable: Option<String>,
    #[serde(default, alias = "messageType")]
    pub parse_mode: ParseMode,
    #[serde(default)]
    pub buttons: Vec<MessageButton>,
}

/// Closed set of node kinds with their configuration
#[derive(Debug, Clone)]
pub enum NodeKind {
    Start,
    Api(ApiConfig),
    Model(ModelConfig),
    Condition(ConditionConfig),
    StrategyTrigger(StrategyTriggerConfig),
    TelegramMessage(TelegramConfig),
}

impl NodeKind {
    /// Parse a node's kind-specific configuration from its stored type tag
    pub fn parse(node_type: &str, config: Value) -> Result<Self, FlowError> {
        let normalized: String = node_type
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        let config = if config.is_null() {
            Value::Object(Map::new())
        } else {
            config
        };

        let kind = match normalized.as_str() {
            "start" | "entry" => NodeKind::Start,
            "api" | "apicall" => NodeKind::Api(from_config(node_type, config)?),
            "model" | "llm" => NodeKind::Model(from_config(node_type, config)?),
            "condition" => NodeKind::Condition(from_config(node_type, config)?),
            "strategytrigger" | "trigger" => {
                NodeKind::StrategyTrigger(from_config(node_type, config)?)
            }
            "telegrammessage" | "telegram" => {
                NodeKind::TelegramMessage(from_config(node_type, config)?)
            }
            _ => {
                return Err(FlowError::config(format!(
                    "unknown node type '{}'",
                    node_type
                )))
            }
        };
        Ok(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Api(_) => "api",
            NodeKind::Model(_) => "model",
            NodeKind::Condition(_) => "condition",
            NodeKind::StrategyTrigger(_) => "strategy_trigger",
            NodeKind::TelegramMessage(_) => "telegram_message",
        }
    }

    /// Environment keys the configuration reads, used for the step input snapshot
    pub fn referenced_variables(&self) -> Vec<String> {
        let mut keys = Vec::new();
        match self {
            NodeKind::Start => {}
            NodeKind::Api(cfg) => {
                keys.extend(template_keys(&cfg.url));
                for (name, value) in &cfg.headers {
                    keys.extend(template_keys(name));
                    keys.extend(template_keys(value));
                }
                if let Some(body) = &cfg.body {
                    keys.extend(template_keys(&body_text(body)));
                }
            }
            NodeKind::Model(cfg) => {
                keys.extend(template_keys(&cfg.system_prompt));
                keys.extend(template_keys(&cfg.user_prompt));
            }
            NodeKind::Condition(cfg) => {
                let left = cfg.left.trim();
                if !left.is_empty() && template_keys(left).is_empty() {
                    keys.push(left.to_string());
                }
                keys.extend(template_keys(left));
                keys.extend(template_keys(&cfg.right));
            }
            NodeKind::StrategyTrigger(cfg) => {
                keys.extend(cfg.condition_variable.iter().cloned());
                keys.extend(cfg.forward_variables.iter().cloned());
            }
            NodeKind::TelegramMessage(cfg) => {
                keys.extend(template_keys(&cfg.chat_id));
                keys.extend(template_keys(&cfg.template));
                keys.extend(cfg.only_if_variable.iter().cloned());
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }
}

pub(crate) fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn from_config<T: serde::de::DeserializeOwned>(node_type: &str, config: Value) -> Result<T, FlowError> {
    serde_json::from_value(config)
        .map_err(|e| FlowError::config(format!("invalid {} node configuration: {}", node_type, e)))
}

fn de_stringish<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn de_id<'de, D>(deserializer: D) -> Result<StrategyId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid strategy id {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid strategy id '{}'", s))),
        other => Err(serde::de::Error::custom(format!("invalid strategy id {}", other))),
    }
}

/// One step in a flow graph
#[derive(Debug, Clone)]
pub struct FlowNode {
    pub id: NodeId,
    pub strategy_id: StrategyId,
    pub label: String,
    pub kind: NodeKind,
    pub output_variable: Option<String>,
    pub enabled: bool,
    pub required: bool,
    pub order_index: i32,
}

impl FlowNode {
    pub fn from_record(record: NodeRecord) -> Result<Self, FlowError> {
        let kind = NodeKind::parse(&record.node_type, record.config)
            .map_err(|e| FlowError::config(format!("node {}: {}", record.id, e)))?;
        let output_variable = record
            .output_variable
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(Self {
            id: record.id,
            strategy_id: record.strategy_id,
            label: record.label.unwrap_or_else(|| format!("{} #{}", kind.name(), record.id)),
            kind,
            output_variable,
            enabled: record.enabled,
            required: record.required,
            order_index: record.order_index,
        })
    }

    /// Variable names this node can write when it succeeds
    pub fn declared_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.output_variable.iter().map(String::as_str).collect();
        if let NodeKind::Condition(cfg) = &self.kind {
            names.extend(cfg.true_variable.as_deref());
            names.extend(cfg.false_variable.as_deref());
        }
        names.into_iter().map(str::trim).filter(|n| !n.is_empty()).collect()
    }
}

/// Immutable record of one node invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    /// Assigned by the execution store; `None` if the store rejected the log
    pub id: Option<StepLogId>,
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    pub node_kind: String,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExecution {
    pub strategy_id: StrategyId,
    pub trigger: TriggerKind,
    pub parent_execution_id: Option<ExecutionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub strategy_id: StrategyId,
    pub parent_execution_id: Option<ExecutionId>,
    pub trigger: TriggerKind,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What the caller of a run gets back
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub strategy_id: StrategyId,
    pub success: bool,
    pub variables: Map<String, Value>,
    pub logs: Vec<StepLog>,
    pub error: Option<String>,
}
