//! teloxide-backed message delivery for TelegramMessage nodes

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flow_engine::capabilities::{MessageSender, OutboundMessage};
use flow_engine::model::{MessageButton, ParseMode};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, Recipient, ReplyParameters};

pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Numeric chat ids, or `@channel` usernames
pub fn parse_recipient(chat_id: &str) -> Result<Recipient> {
    let chat_id = chat_id.trim();
    if let Ok(id) = chat_id.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if chat_id.starts_with('@') && chat_id.len() > 1 {
        return Ok(Recipient::ChannelUsername(chat_id.to_string()));
    }
    bail!("invalid Telegram chat id '{}'", chat_id)
}

fn keyboard(buttons: &[MessageButton]) -> Result<Option<InlineKeyboardMarkup>> {
    if buttons.is_empty() {
        return Ok(None);
    }
    let mut row = Vec::with_capacity(buttons.len());
    for button in buttons {
        let url = url::Url::parse(&button.url)
            .with_context(|| format!("invalid button url '{}'", button.url))?;
        row.push(InlineKeyboardButton::url(button.text.clone(), url));
    }
    Ok(Some(InlineKeyboardMarkup::new(vec![row])))
}

#[allow(deprecated)]
fn telegram_parse_mode(mode: ParseMode) -> Option<teloxide::types::ParseMode> {
    match mode {
        ParseMode::Html => Some(teloxide::types::ParseMode::Html),
        ParseMode::Markdown => Some(teloxide::types::ParseMode::Markdown),
        ParseMode::MarkdownV2 => Some(teloxide::types::ParseMode::MarkdownV2),
        ParseMode::Plain => None,
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, message: &OutboundMessage) -> Result<i64> {
        let recipient = parse_recipient(&message.chat_id)?;
        let mut request = self.bot.send_message(recipient, message.text.clone());

        if message.formatted {
            if let Some(mode) = telegram_parse_mode(message.parse_mode) {
                request = request.parse_mode(mode);
            }
            if let Some(markup) = keyboard(&message.buttons)? {
                request = request.reply_markup(markup);
            }
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to as i32)));
        }

        let sent = request
            .await
            .with_context(|| format!("Failed to send message to {}", message.chat_id))?;
        Ok(sent.id.0 as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipient() {
        assert!(matches!(
            parse_recipient("-1001234567890").unwrap(),
            Recipient::Id(ChatId(-1001234567890))
        ));
        assert!(matches!(
            parse_recipient("@signals").unwrap(),
            Recipient::ChannelUsername(name) if name == "@signals"
        ));
        assert!(parse_recipient("signals").is_err());
        assert!(parse_recipient("@").is_err());
    }

    #[test]
    fn test_keyboard_rejects_bad_urls() {
        let good = vec![MessageButton {
            text: "Chart".to_string(),
            url: "https://example.com/chart".to_string(),
        }];
        assert!(keyboard(&good).unwrap().is_some());
        assert!(keyboard(&[]).unwrap().is_none());

        let bad = vec![MessageButton {
            text: "Chart".to_string(),
            url: "not a url".to_string(),
        }];
        assert!(keyboard(&bad).is_err());
    }
}
