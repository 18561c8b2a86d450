//! TelegramMessage step: renders an alert and hands it to the dispatcher

use serde_json::{json, Map, Value};

use crate::capabilities::OutboundMessage;
use crate::dispatcher::NotificationDispatcher;
use crate::error::StepError;
use crate::executors::StepOutcome;
use crate::model::{Handle, MessageButton, ParseMode, TelegramConfig};
use crate::variables::VariableEnvironment;

pub fn render_message(config: &TelegramConfig, env: &VariableEnvironment) -> Result<OutboundMessage, StepError> {
    let chat_id = env.render(config.chat_id.trim()).trim().to_string();
    if chat_id.is_empty() {
        return Err(StepError::soft("chat id renders to an empty string"));
    }

    let mut text = env.render(&config.template);
    if text.trim().is_empty() {
        return Err(StepError::soft("message renders to an empty string"));
    }
    if config.include_api_data {
        append_variables(&mut text, &env.snapshot(), config.parse_mode);
    }

    let buttons = config
        .buttons
        .iter()
        .map(|b| MessageButton {
            text: env.render(&b.text).trim().to_string(),
            url: env.render(&b.url).trim().to_string(),
        })
        .filter(|b| !b.text.is_empty() && !b.url.is_empty())
        .collect();

    Ok(OutboundMessage {
        chat_id,
        text,
        parse_mode: config.parse_mode,
        buttons,
        formatted: true,
        reply_to: None,
    })
}

fn append_variables(text: &mut String, variables: &Map<String, Value>, mode: ParseMode) {
    let data = Value::Object(variables.clone());
    let pretty = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
    text.push_str("\n\n");
    match mode {
        ParseMode::Html => {
            text.push_str("<pre>");
            text.push_str(&escape_html(&pretty));
            text.push_str("</pre>");
        }
        ParseMode::Markdown => {
            text.push_str("```\n");
            text.push_str(&pretty);
            text.push_str("\n```");
        }
        ParseMode::MarkdownV2 => {
            text.push_str("```\n");
            text.push_str(&pretty.replace('\\', "\\\\").replace('`', "\\`"));
            text.push_str("\n```");
        }
        ParseMode::Plain => text.push_str(&pretty),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub async fn execute(
    dispatcher: &NotificationDispatcher,
    config: &TelegramConfig,
    env: &VariableEnvironment,
) -> StepOutcome {
    if let Some(gate) = config
        .only_if_variable
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
    {
        if !env.is_truthy(gate) {
            return StepOutcome::skipped(format!("'{}' is not truthy", gate));
        }
    }

    let message = match render_message(config, env) {
        Ok(message) => message,
        Err(e) => return StepOutcome::failed(e),
    };

    match dispatcher.dispatch(message).await {
        Ok(outcome) => StepOutcome::routed(Handle::Default).with_report(json!({
            "fingerprint": outcome.fingerprint,
            "delivery": outcome.delivery,
            "messageId": outcome.message_id,
            "sendCount": outcome.send_count,
        })),
        Err(e) => StepOutcome::failed(StepError::soft(format!("failed to deliver message: {:#}", e))),
    }
}
