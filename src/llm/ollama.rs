//! Ollama client implementation
//!
//! Async HTTP client for the Ollama API with tool calling support. All
//! requests are synchronous request/response (`stream: false`); the
//! orchestration layer never streams.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::core::{Config, MaestroError, Message, Result, ToolCall};
use crate::llm::traits::LlmBackend;

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    stream: bool,
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

/// Ollama tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: Map<String, Value>,
}

/// Ollama chat response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// Ollama generate response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
            model: config.models.chat.clone(),
        })
    }

    /// Create a client configured with the plain-generation model instead
    /// of the chat model
    pub fn from_config_generate(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
            model: config.models.generate.clone(),
        })
    }

    /// Create a client with a custom base URL and model
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Model this client talks to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert internal Message to Ollama format
    fn to_wire_message(msg: &Message) -> WireMessage {
        WireMessage {
            role: msg.role.to_string(),
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| WireToolCall {
                        function: WireFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }

    /// Convert an Ollama response message to the internal Message type
    fn from_wire_message(msg: WireMessage) -> Message {
        let tool_calls: Vec<ToolCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.function.name, tc.function.arguments))
            .collect();

        let mut message = match msg.role.as_str() {
            "user" => Message::user(msg.content),
            "system" => Message::system(msg.content),
            "tool" => Message::tool(msg.content),
            _ => Message::assistant(msg.content),
        };
        if !tool_calls.is_empty() {
            message = message.with_tool_calls(tool_calls);
        }
        message
    }

    fn connect_error(&self, e: reqwest::Error) -> MaestroError {
        if e.is_connect() {
            MaestroError::backend(format!(
                "Cannot connect to Ollama at {}. Is it running?",
                self.base_url
            ))
        } else {
            MaestroError::from(e)
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn chat(&self, messages: &[Message], tools: &[Value]) -> Result<Message> {
        let wire_messages: Vec<WireMessage> = messages.iter().map(Self::to_wire_message).collect();

        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages,
            tools: (!tools.is_empty()).then_some(tools),
            stream: false,
        };

        debug!(model = %self.model, tools = tools.len(), "chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MaestroError::backend(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| MaestroError::backend(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = chat_response.error {
            return Err(MaestroError::backend(error));
        }

        let message = chat_response
            .message
            .ok_or_else(|| MaestroError::backend("Response contained no message"))?;

        Ok(Self::from_wire_message(message))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!(model = %self.model, "generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MaestroError::backend(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| MaestroError::backend(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = generate_response.error {
            return Err(MaestroError::backend(error));
        }

        generate_response
            .response
            .ok_or_else(|| MaestroError::backend("Response contained no completion"))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
