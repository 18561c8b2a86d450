//! Cron scheduler for enabled strategies

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use flow_engine::capabilities::GraphStore;
use flow_engine::interpreter::FlowInterpreter;
use flow_engine::model::{Strategy, StrategyId, TriggerKind};
use tracing::{debug, error, info, warn};

struct ScheduleEntry {
    expression: String,
    cron: Cron,
    next: DateTime<Utc>,
}

/// Next fire time per scheduled strategy.
///
/// Rebuilt from the strategy list on every tick so edited or removed
/// schedules take effect without a restart.
#[derive(Default)]
pub struct CronTable {
    entries: HashMap<StrategyId, ScheduleEntry>,
    /// Expressions that failed to parse, so each edit warns once
    invalid: HashMap<StrategyId, String>,
}

impl CronTable {
    /// Sync with `strategies` and return the ids whose fire time has come
    pub fn refresh(&mut self, strategies: &[Strategy], now: DateTime<Utc>) -> Vec<StrategyId> {
        let mut due = Vec::new();
        let mut seen = Vec::with_capacity(strategies.len());
        let mut exhausted = Vec::new();

        for strategy in strategies.iter().filter(|s| s.enabled) {
            let Some(expression) = strategy
                .schedule
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            seen.push(strategy.id);

            if let Some(entry) = self
                .entries
                .get_mut(&strategy.id)
                .filter(|e| e.expression == expression)
            {
                if entry.next <= now {
                    due.push(strategy.id);
                    match entry.cron.find_next_occurrence(&now, false) {
                        Ok(next) => entry.next = next,
                        Err(e) => {
                            warn!(strategy_id = strategy.id, "No further occurrence for '{}': {}", expression, e);
                            exhausted.push(strategy.id);
                        }
                    }
                }
                continue;
            }

            if self.invalid.get(&strategy.id).is_some_and(|bad| bad == expression) {
                continue;
            }
            match schedule_entry(expression, now) {
                Ok(entry) => {
                    self.invalid.remove(&strategy.id);
                    info!(
                        strategy_id = strategy.id,
                        schedule = expression,
                        next = %entry.next.format("%Y-%m-%d %H:%M:%S UTC"),
                        "Scheduled strategy"
                    );
                    self.entries.insert(strategy.id, entry);
                }
                Err(e) => {
                    warn!(strategy_id = strategy.id, "Invalid cron expression '{}': {}", expression, e);
                    self.entries.remove(&strategy.id);
                    self.invalid.insert(strategy.id, expression.to_string());
                }
            }
        }

        self.entries.retain(|id, _| seen.contains(id) && !exhausted.contains(id));
        self.invalid.retain(|id, _| seen.contains(id));
        due
    }

    pub fn next_fire(&self, strategy_id: StrategyId) -> Option<DateTime<Utc>> {
        self.entries.get(&strategy_id).map(|e| e.next)
    }

    pub fn scheduled_count(&self) -> usize {
        self.entries.len()
    }
}

fn schedule_entry(expression: &str, now: DateTime<Utc>) -> anyhow::Result<ScheduleEntry> {
    let cron = Cron::new(expression).parse()?;
    let next = cron.find_next_occurrence(&now, false)?;
    Ok(ScheduleEntry {
        expression: expression.to_string(),
        cron,
        next,
    })
}

pub struct StrategyScheduler {
    graphs: Arc<dyn GraphStore>,
    interpreter: FlowInterpreter,
    tick: Duration,
}

impl StrategyScheduler {
    pub fn new(graphs: Arc<dyn GraphStore>, interpreter: FlowInterpreter, tick: Duration) -> Self {
        Self {
            graphs,
            interpreter,
            tick,
        }
    }

    pub async fn run(self) {
        info!(tick_secs = self.tick.as_secs(), "⏰ Strategy scheduler started");
        let mut table = CronTable::default();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let strategies = match self.graphs.list_enabled_strategies().await {
                Ok(strategies) => strategies,
                Err(e) => {
                    error!("Failed to load scheduled strategies: {:#}", e);
                    continue;
                }
            };

            let due = table.refresh(&strategies, Utc::now());
            debug!(scheduled = table.scheduled_count(), due = due.len(), "Scheduler tick");
            for strategy_id in due {
                info!(strategy_id, next = ?table.next_fire(strategy_id), "Firing scheduled strategy");
                let interpreter = self.interpreter.clone();
                tokio::spawn(async move {
                    match interpreter.execute(strategy_id, TriggerKind::Cron).await {
                        Ok(result) if result.success => {}
                        Ok(result) => warn!(
                            strategy_id,
                            execution_id = result.execution_id,
                            "Scheduled run failed: {}",
                            result.error.unwrap_or_default()
                        ),
                        Err(e) => error!(strategy_id, "Scheduled run did not start: {}", e),
                    }
                });
            }
        }
    }
}
