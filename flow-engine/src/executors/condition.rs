//! Condition step: compares two operands and picks the `true` or `false` handle

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::{json, Value};

use crate::error::StepError;
use crate::executors::StepOutcome;
use crate::model::{ConditionConfig, ConditionKind, Handle, Operator};
use crate::variables::{template_keys, value_to_string, VariableEnvironment, VariableSource};

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }
}

/// Apply `op`: numeric when both sides parse as numbers, string otherwise.
/// The text operators always compare strings.
pub fn compare(left: &str, op: Operator, right: &str) -> bool {
    match op {
        Operator::Contains => left.contains(right),
        Operator::StartsWith => left.starts_with(right),
        Operator::EndsWith => left.ends_with(right),
        Operator::Eq => ordering(left, right) == Some(Ordering::Equal),
        Operator::Ne => ordering(left, right) != Some(Ordering::Equal),
        Operator::Gt => ordering(left, right) == Some(Ordering::Greater),
        Operator::Lt => ordering(left, right) == Some(Ordering::Less),
        Operator::Gte => matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lte => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn ordering(left: &str, right: &str) -> Option<Ordering> {
    match (parse_number(left), parse_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(left.cmp(right)),
    }
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

enum LeftOperand {
    Value(Value),
    /// A variable the graph writes but that has no value in this run
    Missing(String),
}

/// Top-level variable name of a lookup path such as `quote.data[0]`
fn root_name(path: &str) -> &str {
    let path = path.strip_prefix("$.").unwrap_or(path);
    path.split(['.', '[']).next().unwrap_or(path).trim()
}

fn resolve_left(
    config: &ConditionConfig,
    env: &VariableEnvironment,
    declared: &HashSet<String>,
) -> Result<LeftOperand, StepError> {
    let left = config.left.trim();
    if left.is_empty() {
        let source = match config.condition_type {
            ConditionKind::ApiResult => VariableSource::Api,
            ConditionKind::ModelResponse => VariableSource::Model,
            ConditionKind::VariableValue => {
                return Err(StepError::fatal("variable_value condition has no left operand"))
            }
        };
        return env
            .latest_from(source)
            .map(|(_, value)| LeftOperand::Value(value.clone()))
            .ok_or_else(|| {
                StepError::fatal(format!(
                    "no {:?} output exists to compare",
                    config.condition_type
                ))
            });
    }

    let keys = template_keys(left);
    if keys.is_empty() {
        if let Some(value) = env.lookup(left) {
            return Ok(LeftOperand::Value(value));
        }
        if declared.contains(root_name(left)) {
            return Ok(LeftOperand::Missing(left.to_string()));
        }
        return Ok(LeftOperand::Value(Value::String(left.to_string())));
    }

    if let Some(missing) = keys
        .iter()
        .find(|key| env.lookup(key).is_none() && declared.contains(root_name(key)))
    {
        return Ok(LeftOperand::Missing(missing.clone()));
    }
    Ok(LeftOperand::Value(Value::String(env.render(left))))
}

/// Evaluate the condition against `env`.
///
/// `declared` holds the variable names nodes of the graph write. A left
/// operand naming one of them that has no value (its producer failed or was
/// skipped) takes the `false` handle without setting a branch variable.
pub fn execute(config: &ConditionConfig, env: &VariableEnvironment, declared: &HashSet<String>) -> StepOutcome {
    let left = match resolve_left(config, env, declared) {
        Ok(LeftOperand::Value(value)) => value,
        Ok(LeftOperand::Missing(name)) => {
            return StepOutcome::routed(Handle::False).with_report(json!({
                "left": Value::Null,
                "missing": name,
                "operator": config.operator.symbol(),
                "result": false,
            }))
        }
        Err(e) => return StepOutcome::failed(e),
    };
    let right = env.render(&config.right);
    let result = compare(&value_to_string(&left), config.operator, &right);

    let mut outcome = StepOutcome::routed(Handle::from_bool(result));
    let branch_variable = if result {
        config.true_variable.as_deref()
    } else {
        config.false_variable.as_deref()
    };
    if let Some(name) = branch_variable.map(str::trim).filter(|n| !n.is_empty()) {
        outcome.variables.push((name.to_string(), left.clone()));
    }

    outcome.with_report(json!({
        "left": left,
        "operator": config.operator.symbol(),
        "right": right,
        "result": result,
    }))
}
