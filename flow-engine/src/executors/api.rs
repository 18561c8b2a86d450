//! API call step

use std::time::Duration;

use serde_json::{json, Value};

use crate::capabilities::{HttpCapability, HttpRequest};
use crate::error::StepError;
use crate::executors::StepOutcome;
use crate::model::{body_text, ApiConfig};
use crate::variables::{extract_path, VariableEnvironment};

pub fn build_request(config: &ApiConfig, env: &VariableEnvironment, default_timeout: Duration) -> HttpRequest {
    let headers = config
        .headers
        .iter()
        .map(|(name, value)| (env.render(name), env.render(value)))
        .collect();
    let body = config
        .body
        .as_ref()
        .filter(|b| !b.is_null())
        .map(|b| env.render(&body_text(b)));

    HttpRequest {
        method: config.method.trim().to_uppercase(),
        url: env.render(config.url.trim()),
        headers,
        body,
        timeout: config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default_timeout),
    }
}

pub async fn execute(
    http: &dyn HttpCapability,
    config: &ApiConfig,
    env: &VariableEnvironment,
    default_timeout: Duration,
) -> StepOutcome {
    let request = build_request(config, env, default_timeout);
    let method = request.method.clone();
    let url = request.url.clone();
    let timeout = request.timeout;

    let response = match tokio::time::timeout(timeout, http.call(request)).await {
        Err(_) => {
            return StepOutcome::failed(StepError::soft(format!(
                "{} {} timed out after {:?}",
                method, url, timeout
            )))
        }
        Ok(Err(e)) => {
            return StepOutcome::failed(StepError::soft(format!(
                "{} {} failed: {:#}",
                method, url, e
            )))
        }
        Ok(Ok(response)) => response,
    };

    if !response.is_success() {
        let snippet: String = response.body.chars().take(200).collect();
        return StepOutcome::failed(StepError::soft(format!(
            "{} {} returned HTTP {}: {}",
            method, url, response.status, snippet
        )))
        .with_report(json!({ "status": response.status }));
    }

    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
    let value = match config.extract_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => {
            let Some(json) = parsed.as_ref() else {
                return StepOutcome::failed(StepError::soft(format!(
                    "response of {} is not JSON, cannot extract '{}'",
                    url, path
                )));
            };
            match extract_path(json, path) {
                Some(value) => value,
                None => {
                    return StepOutcome::failed(StepError::soft(format!(
                        "path '{}' not found in response of {}",
                        path, url
                    )))
                }
            }
        }
        None => parsed.unwrap_or_else(|| Value::String(response.body.clone())),
    };

    let value = if config.cast_to_number {
        match to_number(&value) {
            Some(number) => number,
            None => {
                return StepOutcome::failed(StepError::soft(format!(
                    "cannot cast {} to a number",
                    value
                )))
                .with_report(json!({ "status": response.status, "value": value }))
            }
        }
    } else {
        value
    };

    StepOutcome::value(value.clone()).with_report(json!({
        "status": response.status,
        "value": value,
    }))
}

fn to_number(value: &Value) -> Option<Value> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(number).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableSource;

    #[test]
    fn test_request_is_interpolated() {
        let config: ApiConfig = serde_json::from_value(json!({
            "method": "post",
            "url": "https://api.example.com/ticker?symbol={{symbol}}",
            "headers": {"Authorization": "Bearer {{token}}"},
            "body": {"symbol": "{{symbol}}"}
        }))
        .unwrap();
        let mut env = VariableEnvironment::new();
        env.set("symbol", json!("BTCUSDT"), VariableSource::Seed);
        env.set("token", json!("secret"), VariableSource::Seed);

        let request = build_request(&config, &env, Duration::from_secs(5));
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.example.com/ticker?symbol=BTCUSDT");
        assert_eq!(request.headers["Authorization"], "Bearer secret");
        assert_eq!(request.body.as_deref(), Some(r#"{"symbol":"BTCUSDT"}"#));
        assert_eq!(request.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&json!("51000.5")), Some(json!(51000.5)));
        assert_eq!(to_number(&json!(42)), Some(json!(42.0)));
        assert_eq!(to_number(&json!("n/a")), None);
        assert_eq!(to_number(&json!({"price": 1})), None);
    }
}
