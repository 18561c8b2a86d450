use std::sync::Arc;

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use shared::Config;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod repositories;
mod services;
mod state;

use crate::commands::{
    handle_executions, handle_help, handle_invalid, handle_run, handle_strategies, handle_version, Command,
};
use crate::services::StrategyScheduler;
use crate::state::AppState;

fn schema() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Version].endpoint(handle_version))
        .branch(case![Command::Strategies].endpoint(handle_strategies))
        .branch(case![Command::Run(arg)].endpoint(handle_run))
        .branch(case![Command::Executions(arg)].endpoint(handle_executions));

    Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(handle_invalid))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting SignalFlow bot...");

    let config = Config::from_env()?;
    let bot = Bot::new(&config.bot_token);

    let app_state = Arc::new(AppState::new(&config, bot.clone()).await?);
    Migrator::up(app_state.db.as_ref(), None)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("AppState initialized, migrations applied");

    if config.scheduler_enabled {
        let scheduler = StrategyScheduler::new(
            app_state.graphs.clone(),
            app_state.interpreter.clone(),
            config.scheduler_tick,
        );
        tokio::spawn(scheduler.run());
    } else {
        tracing::info!("Scheduler disabled, strategies only run on demand");
    }

    let router = api::router(api::ApiState {
        interpreter: app_state.interpreter.clone(),
        executions: app_state.executions.clone(),
    });
    let listener = tokio::net::TcpListener::bind(config.api_listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.api_listen_addr))?;
    tracing::info!("API server listening on http://{}", config.api_listen_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("API server stopped: {}", e);
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![app_state.clone()])
        .enable_ctrlc_handler()
        .build();

    tracing::info!("Bot is running and waiting for updates...");
    dispatcher.dispatch().await;

    Ok(())
}
