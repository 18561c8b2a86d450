//! Shared doubles for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use flow_engine::memory::{InMemoryDedupStore, InMemoryExecutionStore, InMemoryGraphStore, InMemoryUsageCounter};
use flow_engine::prelude::*;

/// Answers registered URLs; anything else behaves like an unreachable host
#[derive(Default)]
pub struct StubHttp {
    responses: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubHttp {
    pub fn respond(&self, url: &str, status: u16, body: Value) {
        let body = match body {
            Value::String(s) => s,
            other => other.to_string(),
        };
        self.responses.lock().unwrap().insert(url.to_string(), (status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpCapability for StubHttp {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let found = self.responses.lock().unwrap().get(&request.url).cloned();
        match found {
            Some((status, body)) => Ok(HttpResponse { status, body }),
            None => Err(anyhow!("connection refused: {}", request.url)),
        }
    }
}

pub struct StubLlm {
    pub reply: String,
    pub tokens: u64,
    prompts: Mutex<Vec<(ModelTier, String, String)>>,
}

impl StubLlm {
    pub fn new(reply: &str, tokens: u64) -> Self {
        Self {
            reply: reply.to_string(),
            tokens,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(ModelTier, String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionCapability for StubLlm {
    async fn complete(&self, tier: ModelTier, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        self.prompts
            .lock()
            .unwrap()
            .push((tier, system_prompt.to_string(), user_prompt.to_string()));
        Ok(Completion {
            text: self.reply.clone(),
            tokens_used: self.tokens,
        })
    }
}

/// Keeps every delivered message; ids start at 101
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl Default for RecordingSender {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            failing: AtomicBool::new(false),
        }
    }
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<i64> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("telegram is down");
        }
        // yield so concurrent dispatches really interleave
        tokio::task::yield_now().await;
        self.sent.lock().unwrap().push(message.clone());
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub struct Harness {
    pub graphs: Arc<InMemoryGraphStore>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub dedup: Arc<InMemoryDedupStore>,
    pub usage: Arc<InMemoryUsageCounter>,
    pub http: Arc<StubHttp>,
    pub llm: Arc<StubLlm>,
    pub sender: Arc<RecordingSender>,
    pub interpreter: FlowInterpreter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_window(DedupWindow::Ttl(Duration::from_secs(3600)))
    }

    pub fn with_window(window: DedupWindow) -> Self {
        let http = Arc::new(StubHttp::default());
        Self::build(window, http.clone(), http)
    }

    /// Engine that performs API calls through `transport` instead of the stub
    pub fn with_http(transport: Arc<dyn HttpCapability>) -> Self {
        Self::build(
            DedupWindow::Ttl(Duration::from_secs(3600)),
            Arc::new(StubHttp::default()),
            transport,
        )
    }

    fn build(window: DedupWindow, http: Arc<StubHttp>, transport: Arc<dyn HttpCapability>) -> Self {
        let graphs = Arc::new(InMemoryGraphStore::new());
        let executions = Arc::new(InMemoryExecutionStore::new());
        let dedup = Arc::new(InMemoryDedupStore::new());
        let usage = Arc::new(InMemoryUsageCounter::new());
        let llm = Arc::new(StubLlm::new("bullish", 42));
        let sender = Arc::new(RecordingSender::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            dedup.clone(),
            sender.clone(),
            window,
            Duration::from_secs(5),
        ));

        let interpreter = FlowInterpreter::new(
            EngineDeps {
                graphs: graphs.clone(),
                executions: executions.clone(),
                http: transport,
                llm: llm.clone(),
                usage: usage.clone(),
                dispatcher,
            },
            EngineConfig {
                http_timeout: Duration::from_secs(5),
                llm_timeout: Duration::from_secs(5),
                max_trigger_depth: 4,
            },
        );

        Self {
            graphs,
            executions,
            dedup,
            usage,
            http,
            llm,
            sender,
            interpreter,
        }
    }

    pub async fn add_strategy(&self, id: StrategyId, nodes: Vec<NodeRecord>, edges: Vec<EdgeRecord>) {
        let strategy = Strategy {
            id,
            name: format!("strategy-{}", id),
            enabled: true,
            schedule: None,
            trigger_metadata: None,
        };
        self.graphs.insert(strategy, RawGraph { nodes, edges }).await;
    }
}

pub fn node(id: NodeId, strategy_id: StrategyId, node_type: &str, config: Value) -> NodeRecord {
    NodeRecord {
        id,
        strategy_id,
        node_type: node_type.to_string(),
        label: None,
        config,
        output_variable: None,
        enabled: true,
        required: false,
        order_index: id as i32,
    }
}

pub fn start(id: NodeId, strategy_id: StrategyId) -> NodeRecord {
    node(id, strategy_id, "start", Value::Null)
}

pub fn telegram(id: NodeId, strategy_id: StrategyId, template: &str) -> NodeRecord {
    node(
        id,
        strategy_id,
        "telegram_message",
        json!({ "chatId": "-100200", "template": template }),
    )
}

pub fn output(mut record: NodeRecord, variable: &str) -> NodeRecord {
    record.output_variable = Some(variable.to_string());
    record
}

pub fn disabled(mut record: NodeRecord) -> NodeRecord {
    record.enabled = false;
    record
}

pub fn required(mut record: NodeRecord) -> NodeRecord {
    record.required = true;
    record
}

pub fn edge(strategy_id: StrategyId, source: NodeId, handle: Option<&str>, target: NodeId) -> EdgeRecord {
    EdgeRecord {
        strategy_id,
        source_node_id: source,
        source_handle: handle.map(str::to_string),
        target_node_id: target,
    }
}

/// Node ids in step-log order
pub fn logged_nodes(result: &ExecutionResult) -> Vec<NodeId> {
    result.logs.iter().map(|l| l.node_id).collect()
}
