//! Chat completion service.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transcript::ChatMessage;

/// Produces one assistant reply for the full message history
pub trait CompletionClient: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Sampling settings sent with every request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl GenerationParams {
    pub fn for_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: 1.0,
            max_tokens: 2048,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    #[serde(flatten)]
    params: &'a GenerationParams,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_reply(response: CompletionResponse) -> Result<String> {
    let Some(choice) = response.choices.into_iter().next() else {
        bail!("completion response has no choices");
    };
    choice
        .message
        .content
        .context("completion response has no message content")
}

/// OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    params: GenerationParams,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        params: GenerationParams,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            params,
        }
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            params: &self.params,
            messages,
        };
        tracing::debug!(
            endpoint = %endpoint,
            model = %self.params.model,
            messages = messages.len(),
            "requesting completion"
        );

        let response = match self
            .agent
            .post(&endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&request)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("Completion failed: {} - {}", status, body);
            }
            Err(err) => return Err(err).context("Failed to reach completion service"),
        };

        let parsed: CompletionResponse = response
            .into_json()
            .context("Failed to parse completion response")?;
        extract_reply(parsed)
    }
}
