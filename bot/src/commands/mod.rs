use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;

use crate::state::HandlerResult;

pub mod admin;
pub mod strategy;

pub use admin::handle_version;
pub use strategy::{handle_executions, handle_run, handle_strategies};

/// 🤖 <b>SignalFlow</b> commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// ✨ Show this help
    Help,
    /// ℹ️ Bot version
    Version,
    /// 📋 List strategies
    Strategies,
    /// ▶️ Run a strategy now: /run <id>
    Run(String),
    /// 🧾 Recent executions of a strategy: /executions <id>
    Executions(String),
}

pub async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_invalid(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Unknown command. Try /help")
        .await?;
    Ok(())
}

/// Parses a strategy or execution id argument
pub(crate) fn parse_id(arg: &str) -> Option<u64> {
    arg.trim().trim_start_matches('#').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 42 "), Some(42));
        assert_eq!(parse_id("#7"), Some(7));
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("abc"), None);
    }

    #[test]
    fn test_run_command_takes_an_argument() {
        match Command::parse("/run 12", "signalflow_bot") {
            Ok(Command::Run(arg)) => assert_eq!(arg, "12"),
            _ => panic!("expected /run to parse"),
        }
    }
}
