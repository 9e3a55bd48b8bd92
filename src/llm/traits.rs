//! LLM backend trait for abstracting different chat providers
//!
//! The orchestration layer consumes this seam; transports enforce their own
//! timeouts.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Message, Result};

/// Trait for LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Send a message list (plus optional tool schemas) and return the
    /// assistant's response message.
    async fn chat(&self, messages: &[Message], tools: &[Value]) -> Result<Message>;

    /// Generate a plain text completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the backend name
    fn name(&self) -> &str;
}
