use std::sync::Arc;

use flow_engine::model::{ExecutionResult, TriggerKind};
use flow_engine::capabilities::ExecutionStore;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html::escape;

use super::parse_id;
use crate::state::{AppState, HandlerResult};

const RECENT_EXECUTIONS: u64 = 10;

pub async fn handle_strategies(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    let strategies = state.graphs.list_all().await?;
    if strategies.is_empty() {
        bot.send_message(msg.chat.id, "No strategies configured yet.").await?;
        return Ok(());
    }

    let mut text = String::from("📋 <b>Strategies</b>\n\n");
    for s in &strategies {
        let status = if s.enabled { "🟢" } else { "⚪" };
        let schedule = s.schedule.as_deref().unwrap_or("manual");
        text.push_str(&format!(
            "{} <code>#{}</code> {} <i>({})</i>\n",
            status,
            s.id,
            escape(&s.name),
            escape(schedule)
        ));
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_run(bot: Bot, msg: Message, state: Arc<AppState>, arg: String) -> HandlerResult {
    let Some(strategy_id) = parse_id(&arg) else {
        bot.send_message(msg.chat.id, "Usage: /run <strategy id>").await?;
        return Ok(());
    };
    tracing::info!(chat_id = msg.chat.id.0, strategy_id, "Handling /run command");

    let reply = match state.interpreter.execute(strategy_id, TriggerKind::Manual).await {
        Ok(result) => run_summary(&result),
        Err(e) => format!("❌ Could not run strategy <code>#{}</code>: {}", strategy_id, escape(&e.to_string())),
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_executions(bot: Bot, msg: Message, state: Arc<AppState>, arg: String) -> HandlerResult {
    let Some(strategy_id) = parse_id(&arg) else {
        bot.send_message(msg.chat.id, "Usage: /executions <strategy id>").await?;
        return Ok(());
    };

    let executions = state
        .executions
        .list_executions(strategy_id, RECENT_EXECUTIONS)
        .await?;
    if executions.is_empty() {
        bot.send_message(msg.chat.id, format!("No executions for strategy #{}.", strategy_id)).await?;
        return Ok(());
    }

    let mut text = format!("🧾 <b>Executions of #{}</b>\n\n", strategy_id);
    for e in &executions {
        text.push_str(&format!(
            "<code>#{}</code> {} {} <i>{}</i>",
            e.id,
            e.status.as_str(),
            e.trigger.as_str(),
            e.started_at.format("%Y-%m-%d %H:%M:%S")
        ));
        if let Some(error) = &e.error {
            text.push_str(&format!("\n   ⚠️ {}", escape(error)));
        }
        text.push('\n');
    }

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

fn run_summary(result: &ExecutionResult) -> String {
    let mut text = if result.success {
        format!("✅ Execution <code>#{}</code> succeeded", result.execution_id)
    } else {
        format!("❌ Execution <code>#{}</code> failed", result.execution_id)
    };
    text.push_str(&format!(" ({} steps)\n", result.logs.len()));

    for log in &result.logs {
        let mark = if log.error.is_some() { "⚠️" } else { "•" };
        text.push_str(&format!(
            "{} <code>{}</code> {} {}ms\n",
            mark, log.node_id, log.node_kind, log.duration_ms
        ));
    }
    if let Some(error) = &result.error {
        text.push_str(&format!("\n<b>Error:</b> {}", escape(error)));
    }
    text
}
