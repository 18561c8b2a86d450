//! Process-wide token accounting in Redis

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use flow_engine::capabilities::UsageCounter;
use flow_engine::model::ModelTier;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

pub struct RedisUsageCounter {
    conn: MultiplexedConnection,
}

impl RedisUsageCounter {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Tokens consumed by `tier` today (UTC)
    pub async fn today(&self, tier: ModelTier) -> Result<u64> {
        let mut conn = self.conn.clone();
        let used: Option<u64> = conn
            .get(daily_key(tier, &Utc::now().format("%Y-%m-%d").to_string()))
            .await
            .context("Failed to read token usage")?;
        Ok(used.unwrap_or(0))
    }
}

fn total_key(tier: ModelTier) -> String {
    format!("signalflow:tokens:{}", tier.as_str())
}

fn daily_key(tier: ModelTier, day: &str) -> String {
    format!("signalflow:tokens:{}:{}", tier.as_str(), day)
}

#[async_trait]
impl UsageCounter for RedisUsageCounter {
    async fn record(&self, tier: ModelTier, tokens: u64) -> Result<()> {
        if tokens == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let _: () = redis::pipe()
            .incr(total_key(tier), tokens)
            .ignore()
            .incr(daily_key(tier, &day), tokens)
            .ignore()
            .expire(daily_key(tier, &day), 60 * 60 * 24 * 32)
            .ignore()
            .query_async(&mut conn)
            .await
            .context("Failed to record token usage")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_keys() {
        assert_eq!(total_key(ModelTier::Cheap), "signalflow:tokens:cheap");
        assert_eq!(daily_key(ModelTier::Deep, "2025-01-01"), "signalflow:tokens:deep:2025-01-01");
    }
}
