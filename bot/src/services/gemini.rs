//! Gemini text completion service
//!
//! Backs the engine's Model nodes. The cheap and deep tiers map to two
//! configurable Gemini models.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use flow_engine::capabilities::{Completion, CompletionCapability};
use flow_engine::model::ModelTier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiService {
    api_key: Option<String>,
    cheap_model: String,
    deep_model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

impl GeminiService {
    pub fn with_config(
        api_key: Option<String>,
        cheap_model: String,
        deep_model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            cheap_model,
            deep_model,
            base_url,
            client,
        })
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Cheap => &self.cheap_model,
            ModelTier::Deep => &self.deep_model,
        }
    }

    /// Key-free endpoint; the key goes in the `x-goog-api-key` header
    fn build_api_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    pub async fn generate(&self, tier: ModelTier, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY is not configured"))?;
        let model = self.model_for(tier);

        let request = GeminiRequest {
            system_instruction: (!system_prompt.trim().is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: user_prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.build_api_url(model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Gemini request to {} failed", model))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Gemini API error ({}): {}", status, error_text);
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;

        let text = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("No response from Gemini API"))?;

        let tokens_used = gemini_response
            .usage_metadata
            .map(|u| u.total_token_count)
            .unwrap_or(0);
        tracing::debug!(model, tokens_used, "Gemini completion received");

        Ok(Completion { text, tokens_used })
    }
}

#[async_trait]
impl CompletionCapability for GeminiService {
    async fn complete(&self, tier: ModelTier, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        self.generate(tier, system_prompt, user_prompt).await
    }
}
