use std::sync::Arc;

use flow_engine::model::ModelTier;
use teloxide::prelude::*;

use crate::state::{AppState, HandlerResult};

/// Handler for the /version command: git details embedded by build.rs
/// plus today's token usage.
pub async fn handle_version(bot: Bot, msg: Message, state: Arc<AppState>) -> HandlerResult {
    tracing::info!(chat_id = msg.chat.id.0, "Handling /version command");

    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_branch = option_env!("GIT_BRANCH").unwrap_or("unknown");
    let git_tag = option_env!("GIT_TAG").unwrap_or("unknown");

    // Format build time as human-readable string if possible
    let build_time_raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    let build_time_human = build_time_raw
        .parse::<i64>()
        .ok()
        .and_then(|epoch| {
            use chrono::{TimeZone, Utc};
            Utc.timestamp_opt(epoch, 0).single()
        })
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| build_time_raw.to_string());

    let cheap_tokens = state.usage.today(ModelTier::Cheap).await.unwrap_or(0);
    let deep_tokens = state.usage.today(ModelTier::Deep).await.unwrap_or(0);

    let version_info = format!(
        "✅ 🤖 <b>{} Version</b> \n\
        <b>Version:</b> <code>{}</code>\n\
        <b>Branch:</b> <code>{}</code>\n\
        <b>Tag:</b> <code>{}</code>\n\
        <b>Commit:</b> <code>{}</code>\n\
        <b>Build Time:</b> <code>{}</code>\n\
        <b>Tokens today:</b> <code>{}</code> cheap / <code>{}</code> deep",
        teloxide::utils::html::escape(&state.bot_name),
        env!("CARGO_PKG_VERSION"),
        git_branch,
        git_tag,
        git_hash,
        build_time_human,
        cheap_tokens,
        deep_tokens,
    );

    bot.send_message(msg.chat.id, version_info)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;

    Ok(())
}
