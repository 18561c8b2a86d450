//! StrategyTrigger step: runs another strategy as a sub-execution

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{FlowError, StepError};
use crate::executors::StepOutcome;
use crate::interpreter::{ExecutionRequest, FlowInterpreter, RunContext};
use crate::model::{Handle, StrategyTriggerConfig};
use crate::variables::VariableEnvironment;

pub(crate) async fn execute(
    interpreter: &FlowInterpreter,
    run: &RunContext,
    config: &StrategyTriggerConfig,
    env: &VariableEnvironment,
) -> StepOutcome {
    if let Some(gate) = config
        .condition_variable
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
    {
        if !env.is_truthy(gate) {
            return StepOutcome::skipped(format!("'{}' is not truthy", gate));
        }
    }

    let target = config.target_strategy_id;
    if run.call_stack.contains(&target) {
        return StepOutcome::failed(
            FlowError::CyclicTrigger {
                target,
                stack: run.call_stack.clone(),
            }
            .into(),
        );
    }
    let limit = interpreter.config().max_trigger_depth;
    if run.call_stack.len() >= limit {
        return StepOutcome::failed(
            FlowError::TriggerDepth {
                depth: run.call_stack.len() + 1,
                limit,
            }
            .into(),
        );
    }

    let seed: Map<String, Value> = config
        .forward_variables
        .iter()
        .filter_map(|name| env.lookup(name).map(|value| (name.clone(), value)))
        .collect();
    let request = ExecutionRequest {
        strategy_id: target,
        trigger: run.trigger,
        seed,
        call_stack: run.call_stack.clone(),
        parent_execution_id: Some(run.execution_id),
    };

    if !config.wait_for_completion {
        let parent_execution_id = run.execution_id;
        let sub_run = interpreter.execute_request(request);
        tokio::spawn(async move {
            match sub_run.await {
                Ok(result) => info!(
                    parent_execution_id,
                    execution_id = result.execution_id,
                    success = result.success,
                    "Detached sub-run of strategy {} finished",
                    target
                ),
                Err(e) => warn!(
                    parent_execution_id,
                    "Detached sub-run of strategy {} did not start: {}", target, e
                ),
            }
        });
        return StepOutcome::routed(Handle::Default)
            .with_report(json!({ "dispatched": true, "targetStrategyId": target }));
    }

    match interpreter.execute_request(request).await {
        Ok(result) => {
            let output = if config.include_variables {
                json!({
                    "success": result.success,
                    "executionId": result.execution_id,
                    "error": result.error,
                    "variables": result.variables,
                })
            } else {
                Value::Bool(result.success)
            };
            StepOutcome::value(output.clone()).with_report(json!({
                "targetStrategyId": target,
                "executionId": result.execution_id,
                "success": result.success,
                "output": output,
            }))
        }
        Err(e) => StepOutcome::failed(StepError::soft(format!(
            "sub-run of strategy {} did not start: {}",
            target, e
        ))),
    }
}
