//! Flow interpreter: walks a strategy's graph and executes its nodes

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::capabilities::{CompletionCapability, ExecutionStore, GraphStore, HttpCapability, UsageCounter};
use crate::dispatcher::NotificationDispatcher;
use crate::error::FlowError;
use crate::executors::{self, StepOutcome};
use crate::graph::FlowGraph;
use crate::model::{
    ExecutionId, ExecutionResult, FlowNode, Handle, NewExecution, NodeKind, StrategyId, TriggerKind,
};
use crate::recorder::ExecutionRecorder;
use crate::variables::{VariableEnvironment, VariableSource};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default bound for API nodes without their own `timeoutSecs`
    pub http_timeout: Duration,
    pub llm_timeout: Duration,
    /// Longest allowed chain of nested StrategyTrigger sub-runs
    pub max_trigger_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(60),
            max_trigger_depth: 16,
        }
    }
}

/// Collaborators shared by every run
#[derive(Clone)]
pub struct EngineDeps {
    pub graphs: Arc<dyn GraphStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub http: Arc<dyn HttpCapability>,
    pub llm: Arc<dyn CompletionCapability>,
    pub usage: Arc<dyn UsageCounter>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub strategy_id: StrategyId,
    pub trigger: TriggerKind,
    /// Variables forwarded by a calling StrategyTrigger
    pub seed: Map<String, Value>,
    /// Strategies already executing above this run, outermost first
    pub call_stack: Vec<StrategyId>,
    pub parent_execution_id: Option<ExecutionId>,
}

impl ExecutionRequest {
    pub fn new(strategy_id: StrategyId, trigger: TriggerKind) -> Self {
        Self {
            strategy_id,
            trigger,
            seed: Map::new(),
            call_stack: Vec::new(),
            parent_execution_id: None,
        }
    }
}

/// What executors need to know about the run they belong to
pub(crate) struct RunContext {
    pub execution_id: ExecutionId,
    pub trigger: TriggerKind,
    /// Ancestors plus the running strategy itself
    pub call_stack: Vec<StrategyId>,
}

struct Inner {
    deps: EngineDeps,
    config: EngineConfig,
}

/// Cheap to clone; every clone shares the same collaborators.
#[derive(Clone)]
pub struct FlowInterpreter {
    inner: Arc<Inner>,
}

impl FlowInterpreter {
    pub fn new(deps: EngineDeps, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner { deps, config }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn deps(&self) -> &EngineDeps {
        &self.inner.deps
    }

    /// Run a strategy once from its entry nodes.
    ///
    /// Returns `Err` only when the run could not start (configuration or
    /// store failure); node failures are reported in the result.
    pub async fn execute(&self, strategy_id: StrategyId, trigger: TriggerKind) -> Result<ExecutionResult, FlowError> {
        self.execute_request(ExecutionRequest::new(strategy_id, trigger)).await
    }

    /// Boxed so nested StrategyTrigger runs can recurse and be spawned
    pub fn execute_request(&self, request: ExecutionRequest) -> BoxFuture<'static, Result<ExecutionResult, FlowError>> {
        let this = self.clone();
        async move { this.run(request).await }.boxed()
    }

    async fn run(&self, request: ExecutionRequest) -> Result<ExecutionResult, FlowError> {
        let deps = &self.inner.deps;
        let strategy_id = request.strategy_id;

        let strategy = deps
            .graphs
            .load_strategy(strategy_id)
            .await?
            .ok_or_else(|| FlowError::config(format!("strategy {} does not exist", strategy_id)))?;
        let raw = deps.graphs.load_graph(strategy_id).await?;
        let graph = FlowGraph::build(strategy_id, raw)?;

        let recorder = ExecutionRecorder::begin(
            deps.executions.clone(),
            NewExecution {
                strategy_id,
                trigger: request.trigger,
                parent_execution_id: request.parent_execution_id,
            },
        )
        .await?;
        let execution_id = recorder.execution_id();

        let mut call_stack = request.call_stack;
        call_stack.push(strategy_id);
        let run = RunContext {
            execution_id,
            trigger: request.trigger,
            call_stack,
        };
        let env = VariableEnvironment::seeded(request.seed);

        let span = info_span!("execution", strategy_id, execution_id, trigger = run.trigger.as_str());
        async move {
            info!(strategy = %strategy.name, nodes = graph.len(), "▶️ Starting execution");
            let result = self.traverse(&graph, &run, env, recorder).await;
            if result.success {
                info!(steps = result.logs.len(), "✅ Execution succeeded");
            } else {
                warn!(steps = result.logs.len(), error = ?result.error, "❌ Execution failed");
            }
            Ok(result)
        }
        .instrument(span)
        .await
    }

    async fn traverse(
        &self,
        graph: &FlowGraph,
        run: &RunContext,
        mut env: VariableEnvironment,
        mut recorder: ExecutionRecorder,
    ) -> ExecutionResult {
        let mut queued = vec![false; graph.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &idx in graph.entries() {
            queued[idx] = true;
            queue.push_back(idx);
        }
        let mut fatal: Option<FlowError> = None;

        while let Some(idx) = queue.pop_front() {
            let node = graph.node(idx);

            let handle = if !node.enabled {
                debug!(node_id = node.id, "Skipping disabled node");
                Handle::Default
            } else if matches!(node.kind, NodeKind::Start) {
                Handle::Default
            } else {
                let input = env.select(&node.kind.referenced_variables());
                let started = Instant::now();
                let mut outcome = self.run_node(graph, node, run, &env).await;
                let elapsed = started.elapsed();

                if let Some(err) = outcome.error.as_mut() {
                    err.fatal |= node.required;
                }
                match &outcome.error {
                    None => apply_outcome(&mut env, node, &outcome),
                    Some(err) if err.fatal => {
                        warn!(node_id = node.id, kind = node.kind.name(), "Fatal step error: {}", err);
                        if fatal.is_none() {
                            fatal = Some(FlowError::FatalNode {
                                node_id: node.id,
                                message: err.message.clone(),
                            });
                        }
                    }
                    Some(err) => {
                        warn!(node_id = node.id, kind = node.kind.name(), "Step failed: {}", err);
                    }
                }

                recorder
                    .record(
                        node,
                        input,
                        outcome.log_output(),
                        outcome.error.as_ref().map(|e| e.message.clone()),
                        elapsed,
                    )
                    .await;
                outcome.handle
            };

            // after a fatal error only what is already queued still runs
            if fatal.is_some() {
                continue;
            }
            for &next in graph.route(idx, handle) {
                if !queued[next] {
                    queued[next] = true;
                    queue.push_back(next);
                }
            }
        }

        let error = fatal.map(|e| e.to_string());
        let logs = recorder.finish(error.as_deref()).await;
        ExecutionResult {
            execution_id: run.execution_id,
            strategy_id: graph.strategy_id(),
            success: error.is_none(),
            variables: env.snapshot(),
            logs,
            error,
        }
    }

    async fn run_node(
        &self,
        graph: &FlowGraph,
        node: &FlowNode,
        run: &RunContext,
        env: &VariableEnvironment,
    ) -> StepOutcome {
        let deps = &self.inner.deps;
        let config = &self.inner.config;
        match &node.kind {
            NodeKind::Start => StepOutcome::routed(Handle::Default),
            NodeKind::Api(cfg) => executors::api::execute(deps.http.as_ref(), cfg, env, config.http_timeout).await,
            NodeKind::Model(cfg) => {
                executors::model::execute(deps.llm.as_ref(), deps.usage.as_ref(), cfg, env, config.llm_timeout).await
            }
            NodeKind::Condition(cfg) => executors::condition::execute(cfg, env, graph.declared_variables()),
            NodeKind::StrategyTrigger(cfg) => executors::trigger::execute(self, run, cfg, env).await,
            NodeKind::TelegramMessage(cfg) => executors::telegram::execute(&deps.dispatcher, cfg, env).await,
        }
    }
}

fn apply_outcome(env: &mut VariableEnvironment, node: &FlowNode, outcome: &StepOutcome) {
    let source = match node.kind {
        NodeKind::Api(_) => VariableSource::Api,
        NodeKind::Model(_) => VariableSource::Model,
        NodeKind::StrategyTrigger(_) => VariableSource::Trigger,
        _ => VariableSource::Condition,
    };
    if let (Some(name), Some(value)) = (&node.output_variable, &outcome.output) {
        env.set(name.clone(), value.clone(), source);
    }
    for (name, value) in &outcome.variables {
        env.set(name.clone(), value.clone(), VariableSource::Condition);
    }
}
