//! Model (LLM) call step

use std::time::Duration;

use serde_json::{json, Value};
use tracing::warn;

use crate::capabilities::{CompletionCapability, UsageCounter};
use crate::error::StepError;
use crate::executors::StepOutcome;
use crate::model::ModelConfig;
use crate::variables::VariableEnvironment;

/// Rendered `(system, user)` prompts
pub fn build_prompts(config: &ModelConfig, env: &VariableEnvironment) -> (String, String) {
    let system = env.render(&config.system_prompt);
    let mut user = env.render(&config.user_prompt);
    if config.include_api_data {
        let data = Value::Object(env.api_snapshot());
        let pretty = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
        user.push_str("\n\nAPI data:\n");
        user.push_str(&pretty);
    }
    (system, user)
}

pub async fn execute(
    llm: &dyn CompletionCapability,
    usage: &dyn UsageCounter,
    config: &ModelConfig,
    env: &VariableEnvironment,
    timeout: Duration,
) -> StepOutcome {
    let (system, user) = build_prompts(config, env);
    if user.trim().is_empty() {
        return StepOutcome::failed(StepError::soft("user prompt renders to an empty string"));
    }

    let completion = match tokio::time::timeout(timeout, llm.complete(config.tier, &system, &user)).await {
        Err(_) => {
            return StepOutcome::failed(StepError::soft(format!(
                "{} model call timed out after {:?}",
                config.tier.as_str(),
                timeout
            )))
        }
        Ok(Err(e)) => {
            return StepOutcome::failed(StepError::soft(format!(
                "{} model call failed: {:#}",
                config.tier.as_str(),
                e
            )))
        }
        Ok(Ok(completion)) => completion,
    };

    if let Err(e) = usage.record(config.tier, completion.tokens_used).await {
        warn!(tier = config.tier.as_str(), "Failed to record token usage: {:#}", e);
    }

    StepOutcome::value(Value::String(completion.text.clone())).with_report(json!({
        "tier": config.tier.as_str(),
        "tokensUsed": completion.tokens_used,
        "text": completion.text,
    }))
}
