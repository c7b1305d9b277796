//! Pure REST LLM client: one provider call in, text + token usage out. No
//! pipeline awareness, mirroring the split between a thin wire client and
//! the higher-level domain logic that wraps it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::LlmError;
use crate::security::ProviderCredentials;

/// The embedding capability the embedding builder depends on.
#[async_trait]
pub trait Embed: Send + Sync {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError>;
}

/// Options for a single completion call.
#[derive(Debug, Clone)]
pub struct CompleteOptions {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
    pub timeout: Duration,
}

impl Default for CompleteOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: 0.2,
            json_mode: false,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a completion call, carrying token counts for cost accounting.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub provider_id: String,
}

/// A single-connection client bound to one set of credentials. Worker pool
/// members each own one of these independently.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    credentials: ProviderCredentials,
}

impl LlmClient {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self { http: reqwest::Client::new(), credentials }
    }

    pub fn model(&self) -> &str {
        &self.credentials.model
    }

    fn base_url(&self) -> &str {
        self.credentials.base_url.as_deref().unwrap_or("https://api.openai.com/v1")
    }

    pub async fn complete(&self, prompt: &str, options: &CompleteOptions) -> Result<CompletionResult, LlmError> {
        let mut body = ChatRequest {
            model: self.credentials.model.clone(),
            messages: vec![ChatMessage { role: "user".into(), content: prompt.to_string() }],
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            response_format: None,
        };

        if options.json_mode {
            body.response_format = Some(ResponseFormat { format_type: "json_object".into() });
        }

        let send = self
            .http
            .post(format!("{}/chat/completions", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.credentials.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(options.timeout)
            .send();

        let start = Instant::now();
        let response = send.await.map_err(|e| classify(&self.credentials.model, e))?;
        let _ = start.elapsed();

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::Auth { provider_id: self.credentials.model.clone() });
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited { provider_id: self.credentials.model.clone(), retry_after_s: retry_after });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::MalformedOutput { provider_id: self.credentials.model.clone(), reason: text });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedOutput { provider_id: self.credentials.model.clone(), reason: e.to_string() })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedOutput { provider_id: self.credentials.model.clone(), reason: "empty choices".into() })?;

        Ok(CompletionResult {
            text: choice.message.content,
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
            provider_id: self.credentials.model.clone(),
        })
    }

    pub async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError> {
        let body = EmbeddingRequest { model: model.to_string(), input: text.to_string() };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url()))
            .header("Authorization", format!("Bearer {}", self.credentials.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(model, e))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::MalformedOutput { provider_id: model.to_string(), reason: text });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedOutput { provider_id: model.to_string(), reason: e.to_string() })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::MalformedOutput { provider_id: model.to_string(), reason: "empty embedding data".into() })
    }
}

#[async_trait]
impl Embed for LlmClient {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError> {
        LlmClient::embed(self, text, model).await
    }
}

fn classify(provider_id: &str, e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout { elapsed_ms: 0 }
    } else {
        LlmError::Transport(format!("{provider_id}: {e}"))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_complete_options_are_non_json() {
        let options = CompleteOptions::default();
        assert!(!options.json_mode);
        assert_eq!(options.max_output_tokens, 2048);
    }
}
