//! `Summarizer` backed by an OpenAI-compatible chat completions endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use sealpack_contracts::error::{SealpackError, SealpackResult};
use sealpack_core::traits::Summarizer;

const TOOL: &str = "summarizer";

const SYSTEM_PROMPT: &str = "You are a software supply-chain security reviewer. \
Be concise and concrete; do not speculate beyond the findings given.";

/// Blocking HTTP summarizer.
pub struct ChatSummarizer {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl ChatSummarizer {
    /// Build a summarizer. Fails only if the HTTP client cannot be created.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> SealpackResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SealpackError::ExternalTool {
                tool: TOOL.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl Summarizer for ChatSummarizer {
    fn summarize(&self, prompt: &str, api_key: &str) -> SealpackResult<String> {
        let external = |reason: String| SealpackError::ExternalTool {
            tool: TOOL.to_string(),
            reason,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting audit summary");

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| external(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(external(format!("endpoint returned HTTP {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| external(format!("unexpected response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| external("response contained no choices".to_string()))
    }
}
