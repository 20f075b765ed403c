use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use sekretarz_core::config::LlmConfig;

use super::{ChatCompletion, ChatMessage, LlmClient, LlmError, ToolCall};
use crate::tools::ToolDescriptor;

const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    id: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

/// Client for `POST {base_url}/chat/completions` on Groq, OpenAI or Ollama.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Client(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDescriptor],
    ) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| OpenAiMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: self.temperature,
            stream: false,
            tools: tools
                .iter()
                .map(|tool| OpenAiTool {
                    tool_type: "function",
                    function: OpenAiFunction {
                        name: tool.name,
                        description: &tool.description,
                        parameters: &tool.input_schema,
                    },
                })
                .collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        }
    }

    async fn send_once(&self, request: &OpenAiRequest<'_>) -> Result<ChatCompletion, LlmError> {
        let mut http_request = self.client.post(self.api_url("chat/completions")).json(request);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request.send().await.map_err(|error| {
            if error.is_connect() {
                LlmError::Transport(format!("cannot connect to {}: {error}", self.base_url))
            } else {
                LlmError::Transport(error.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_response(status, &body));
        }

        parse_completion(&body)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let completion = self.chat(&messages, &[]).await?;
        Ok(completion.content.unwrap_or_default())
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ChatCompletion, LlmError> {
        let request = self.build_request(messages, tools);
        let mut attempt = 0u32;

        loop {
            match self.send_once(&request).await {
                Ok(completion) => {
                    debug!(
                        event_name = "llm.chat.completed",
                        model = %self.model,
                        tool_calls = completion.tool_calls.len(),
                        attempt,
                        "chat completion received"
                    );
                    return Ok(completion);
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.chat.retry",
                        model = %self.model,
                        attempt,
                        error = %error,
                        "retrying chat completion"
                    );
                    let delay = RETRY_BASE_DELAY_MS.saturating_mul(1 << (attempt - 1).min(6));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn parse_completion(body: &str) -> Result<ChatCompletion, LlmError> {
    let response: OpenAiResponse =
        serde_json::from_str(body).map_err(|error| LlmError::Decode(error.to_string()))?;
    let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyChoices)?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            arguments: parse_arguments(&call.function.arguments),
            name: call.function.name,
        })
        .collect::<Vec<_>>();

    debug!(
        finish_reason = ?choice.finish_reason,
        tool_calls = tool_calls.len(),
        "parsed chat completion"
    );

    Ok(ChatCompletion { content: choice.message.content, tool_calls })
}

// Models occasionally send an empty string for tools without parameters.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_error_response(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<OpenAiErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());

    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(message)
    } else {
        LlmError::Status { status: status.as_u16(), message }
    }
}
