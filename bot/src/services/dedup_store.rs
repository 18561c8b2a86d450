//! Redis-backed dedup records for the notification dispatcher

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flow_engine::dispatcher::{DedupRecord, DedupStore};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

const KEY_PREFIX: &str = "signalflow:dedup:";

pub struct RedisDedupStore {
    conn: MultiplexedConnection,
}

impl RedisDedupStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

pub fn dedup_key(fingerprint: &str) -> String {
    format!("{}{}", KEY_PREFIX, fingerprint)
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<DedupRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(dedup_key(fingerprint))
            .await
            .context("Failed to read dedup record from Redis")?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .context("Corrupt dedup record in Redis")
    }

    async fn put(&self, record: &DedupRecord, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record).context("Failed to encode dedup record")?;
        let _: () = conn
            .set_ex(dedup_key(&record.fingerprint), json, ttl.as_secs().max(1))
            .await
            .context("Failed to store dedup record in Redis")?;
        Ok(())
    }
}
