//! Notification dispatcher with per-fingerprint dedup
//!
//! The first send of a fingerprint inside its window is a full alert (parse
//! mode plus inline buttons). Every later send of the same fingerprint inside
//! the window becomes a plain reminder replying to the original message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::capabilities::{MessageSender, OutboundMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub fingerprint: String,
    pub message_id: i64,
    pub first_sent_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
    pub send_count: u32,
}

#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Result<Option<DedupRecord>>;

    /// Store `record`; the store may drop it once `ttl` has elapsed
    async fn put(&self, record: &DedupRecord, ttl: Duration) -> Result<()>;
}

/// How long an identical alert stays deduplicated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DedupWindow {
    /// Fixed duration measured from the first full send
    Ttl(Duration),
    /// Until midnight of the calendar day the first send happened in
    CalendarDay(Tz),
}

impl Default for DedupWindow {
    fn default() -> Self {
        DedupWindow::CalendarDay(Tz::UTC)
    }
}

impl DedupWindow {
    /// `day` (or `calendar_day`), or a number of seconds
    pub fn parse(spec: &str, timezone: &str) -> Result<Self> {
        let spec = spec.trim().to_lowercase();
        match spec.as_str() {
            "day" | "daily" | "calendar_day" => {
                let tz: Tz = timezone
                    .parse()
                    .map_err(|e| anyhow!("invalid dedup timezone '{}': {}", timezone, e))?;
                Ok(DedupWindow::CalendarDay(tz))
            }
            seconds => {
                let secs: u64 = seconds
                    .parse()
                    .with_context(|| format!("invalid dedup window '{}'", seconds))?;
                if secs == 0 {
                    bail!("dedup window must be longer than zero seconds");
                }
                Ok(DedupWindow::Ttl(Duration::from_secs(secs)))
            }
        }
    }

    pub fn contains(&self, first_sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            DedupWindow::Ttl(ttl) => match chrono::Duration::from_std(*ttl) {
                Ok(ttl) => now < first_sent_at + ttl,
                Err(_) => true,
            },
            DedupWindow::CalendarDay(tz) => {
                first_sent_at.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive()
            }
        }
    }

    /// Time left in the window that started at `first_sent_at`
    pub fn remaining(&self, first_sent_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let end = match self {
            DedupWindow::Ttl(ttl) => match chrono::Duration::from_std(*ttl) {
                Ok(ttl) => first_sent_at + ttl,
                Err(_) => return *ttl,
            },
            DedupWindow::CalendarDay(tz) => {
                let next_midnight = first_sent_at
                    .with_timezone(tz)
                    .date_naive()
                    .succ_opt()
                    .and_then(|day| day.and_hms_opt(0, 0, 0))
                    .and_then(|midnight| tz.from_local_datetime(&midnight).earliest());
                match next_midnight {
                    Some(end) => end.with_timezone(&Utc),
                    None => first_sent_at + chrono::Duration::hours(24),
                }
            }
        };
        (end - now).to_std().unwrap_or(Duration::from_secs(1))
    }
}

/// Stable hash identifying "the same logical alert"
pub fn fingerprint(chat_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chat_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Full,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub fingerprint: String,
    pub delivery: Delivery,
    pub message_id: i64,
    pub send_count: u32,
}

pub struct NotificationDispatcher {
    store: Arc<dyn DedupStore>,
    sender: Arc<dyn MessageSender>,
    window: DedupWindow,
    send_timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DedupStore>,
        sender: Arc<dyn MessageSender>,
        window: DedupWindow,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            window,
            send_timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, fingerprint: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release(&self, fingerprint: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // map + this handle: nobody else is waiting
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(fingerprint);
        }
    }

    /// Send `message`, or a reminder of it if the same alert already went out
    /// inside the current window.
    pub async fn dispatch(&self, message: OutboundMessage) -> Result<DispatchOutcome> {
        let fp = fingerprint(&message.chat_id, &message.text);
        let lock = self.lock_for(&fp);
        let outcome = {
            let _guard = lock.lock().await;
            self.dispatch_locked(&fp, message).await
        };
        self.release(&fp, lock);
        outcome
    }

    async fn dispatch_locked(&self, fp: &str, message: OutboundMessage) -> Result<DispatchOutcome> {
        let now = Utc::now();
        let existing = self
            .store
            .get(fp)
            .await
            .context("Failed to read dedup record")?
            .filter(|record| self.window.contains(record.first_sent_at, now));

        match existing {
            None => {
                let message_id = self.send(&message).await?;
                let record = DedupRecord {
                    fingerprint: fp.to_string(),
                    message_id,
                    first_sent_at: now,
                    last_sent_at: now,
                    send_count: 1,
                };
                self.store
                    .put(&record, self.window.remaining(now, now))
                    .await
                    .context("Failed to store dedup record")?;
                info!(fingerprint = %fp, message_id, chat_id = %message.chat_id, "📨 Sent alert");
                Ok(DispatchOutcome {
                    fingerprint: record.fingerprint,
                    delivery: Delivery::Full,
                    message_id,
                    send_count: 1,
                })
            }
            Some(mut record) => {
                let reminder = OutboundMessage {
                    buttons: Vec::new(),
                    formatted: false,
                    reply_to: Some(record.message_id),
                    ..message
                };
                let message_id = self.send(&reminder).await?;
                record.message_id = message_id;
                record.last_sent_at = now;
                record.send_count += 1;
                self.store
                    .put(&record, self.window.remaining(record.first_sent_at, now))
                    .await
                    .context("Failed to update dedup record")?;
                debug!(fingerprint = %fp, message_id, count = record.send_count, "🔁 Sent reminder");
                Ok(DispatchOutcome {
                    fingerprint: record.fingerprint,
                    delivery: Delivery::Reminder,
                    message_id,
                    send_count: record.send_count,
                })
            }
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<i64> {
        tokio::time::timeout(self.send_timeout, self.sender.send(message))
            .await
            .map_err(|_| anyhow!("message send timed out after {:?}", self.send_timeout))?
    }
}
