//! HTTP surface: manual runs and execution history

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use flow_engine::capabilities::ExecutionStore;
use flow_engine::error::FlowError;
use flow_engine::interpreter::FlowInterpreter;
use flow_engine::model::{ExecutionId, StrategyId, TriggerKind};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 200;

#[derive(Clone)]
pub struct ApiState {
    pub interpreter: FlowInterpreter,
    pub executions: Arc<dyn ExecutionStore>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/strategies/:id/execute", post(execute_strategy))
        .route("/api/strategies/:id/executions", get(list_executions))
        .route("/api/executions/:id/logs", get(step_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(err: impl std::fmt::Display) -> Self {
        error!("API request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Configuration(_) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: err.to_string(),
            },
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn execute_strategy(
    State(state): State<ApiState>,
    Path(strategy_id): Path<StrategyId>,
) -> Result<Json<Value>, ApiError> {
    info!(strategy_id, "Manual execution requested over HTTP");
    let result = state.interpreter.execute(strategy_id, TriggerKind::Manual).await?;
    Ok(Json(json!({
        "executionId": result.execution_id,
        "success": result.success,
        "error": result.error,
        "variables": result.variables,
        "logs": result.logs,
    })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<u64>,
}

async fn list_executions(
    State(state): State<ApiState>,
    Path(strategy_id): Path<StrategyId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let executions = state
        .executions
        .list_executions(strategy_id, limit)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(json!({ "executions": executions })))
}

async fn step_logs(
    State(state): State<ApiState>,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    let logs = state
        .executions
        .step_logs(execution_id)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(json!({ "logs": logs })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use flow_engine::capabilities::{
        Completion, CompletionCapability, HttpCapability, HttpRequest, HttpResponse, MessageSender, OutboundMessage,
    };
    use flow_engine::dispatcher::{DedupWindow, NotificationDispatcher};
    use flow_engine::interpreter::{EngineConfig, EngineDeps};
    use flow_engine::memory::{InMemoryDedupStore, InMemoryExecutionStore, InMemoryGraphStore, InMemoryUsageCounter};
    use flow_engine::model::{EdgeRecord, ModelTier, NodeRecord, RawGraph, Strategy};

    struct Offline;

    #[async_trait]
    impl HttpCapability for Offline {
        async fn call(&self, request: HttpRequest) -> Result<HttpResponse> {
            bail!("offline: {}", request.url)
        }
    }

    #[async_trait]
    impl CompletionCapability for Offline {
        async fn complete(&self, _tier: ModelTier, _system: &str, _user: &str) -> Result<Completion> {
            bail!("offline")
        }
    }

    #[async_trait]
    impl MessageSender for Offline {
        async fn send(&self, _message: &OutboundMessage) -> Result<i64> {
            Ok(1)
        }
    }

    fn record(id: u64, node_type: &str, config: Value) -> NodeRecord {
        NodeRecord {
            id,
            strategy_id: 1,
            node_type: node_type.to_string(),
            label: None,
            config,
            output_variable: None,
            enabled: true,
            required: false,
            order_index: id as i32,
        }
    }

    async fn serve() -> String {
        let graphs = Arc::new(InMemoryGraphStore::new());
        graphs
            .insert(
                Strategy {
                    id: 1,
                    name: "alerts".to_string(),
                    enabled: true,
                    schedule: None,
                    trigger_metadata: None,
                },
                RawGraph {
                    nodes: vec![
                        record(1, "start", Value::Null),
                        record(2, "telegram_message", json!({"chatId": "1", "template": "hello"})),
                    ],
                    edges: vec![EdgeRecord {
                        strategy_id: 1,
                        source_node_id: 1,
                        source_handle: None,
                        target_node_id: 2,
                    }],
                },
            )
            .await;
        let executions = Arc::new(InMemoryExecutionStore::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(InMemoryDedupStore::new()),
            Arc::new(Offline),
            DedupWindow::Ttl(Duration::from_secs(60)),
            Duration::from_secs(5),
        ));
        let interpreter = FlowInterpreter::new(
            EngineDeps {
                graphs,
                executions: executions.clone(),
                http: Arc::new(Offline),
                llm: Arc::new(Offline),
                usage: Arc::new(InMemoryUsageCounter::new()),
                dispatcher,
            },
            EngineConfig::default(),
        );

        let app = router(ApiState {
            interpreter,
            executions,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_execute_then_read_history() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let run: Value = client
            .post(format!("{}/api/strategies/1/execute", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(run["success"], json!(true));
        assert_eq!(run["logs"].as_array().unwrap().len(), 1);
        let execution_id = run["executionId"].as_u64().unwrap();

        let history: Value = client
            .get(format!("{}/api/strategies/1/executions?limit=5", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history["executions"][0]["id"], json!(execution_id));
        assert_eq!(history["executions"][0]["status"], json!("success"));

        let logs: Value = client
            .get(format!("{}/api/executions/{}/logs", base, execution_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(logs["logs"][0]["nodeId"], json!(2));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_unprocessable() {
        let base = serve().await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/strategies/99/execute", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve().await;
        let body: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }
}
