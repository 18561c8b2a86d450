use std::sync::Arc;

use flow_engine::dispatcher::{DedupWindow, NotificationDispatcher};
use flow_engine::http::ReqwestHttp;
use flow_engine::interpreter::{EngineConfig, EngineDeps, FlowInterpreter};
use sea_orm::DatabaseConnection;
use shared::{get_db_connection, get_redis_client, get_redis_connection, Config};
use teloxide::Bot;

use crate::repositories::{ExecutionRepository, GraphRepository};
use crate::services::{GeminiService, RedisDedupStore, RedisUsageCounter, TelegramSender};

pub type HandlerResult = Result<(), anyhow::Error>;

#[derive(Clone)]
pub struct AppState {
    pub bot_name: String,
    pub db: Arc<DatabaseConnection>,
    pub graphs: Arc<GraphRepository>,
    pub executions: Arc<ExecutionRepository>,
    pub usage: Arc<RedisUsageCounter>,
    pub interpreter: FlowInterpreter,
}

impl AppState {
    pub async fn new(config: &Config, bot: Bot) -> Result<Self, anyhow::Error> {
        let db = Arc::new(get_db_connection(&config.database_url).await?);
        tracing::info!("Connected to database successfully");

        let redis = get_redis_client(&config.redis_url)?;
        let conn = get_redis_connection(&redis).await?;
        tracing::info!("Connected to Redis successfully");

        let graphs = Arc::new(GraphRepository::new(db.clone()));
        let executions = Arc::new(ExecutionRepository::new(db.clone()));
        let usage = Arc::new(RedisUsageCounter::new(conn.clone()));

        let window = DedupWindow::parse(&config.dedup_window, &config.dedup_timezone)?;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(RedisDedupStore::new(conn)),
            Arc::new(TelegramSender::new(bot)),
            window,
            config.telegram_timeout,
        ));

        if config.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set, Model nodes will fail");
        }
        let gemini = GeminiService::with_config(
            config.gemini_api_key.clone(),
            config.gemini_model_cheap.clone(),
            config.gemini_model_deep.clone(),
            config.gemini_base_url.clone(),
            config.gemini_timeout,
        )?;

        let interpreter = FlowInterpreter::new(
            EngineDeps {
                graphs: graphs.clone(),
                executions: executions.clone(),
                http: Arc::new(ReqwestHttp::new()?),
                llm: Arc::new(gemini),
                usage: usage.clone(),
                dispatcher,
            },
            EngineConfig {
                http_timeout: config.http_timeout,
                llm_timeout: config.gemini_timeout,
                max_trigger_depth: config.max_trigger_depth,
            },
        );

        Ok(AppState {
            bot_name: config.bot_name.clone(),
            db,
            graphs,
            executions,
            usage,
            interpreter,
        })
    }
}
