//! LLM-backed agents
//!
//! `LlmQueryAgent` for one-shot prompt completions, `LlmChatAgent` for chat
//! with a depth-bounded tool-call loop, and `PersistentLlmChatAgent` which
//! keeps a capped cross-invocation history.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::agent::base::{messages_from_inputs, Agent, AgentInputs};
use crate::core::{MaestroError, Message, MessageHistory, Result, ToolCall};
use crate::llm::LlmBackend;
use crate::tools::{Tool, ToolRegistry};

/// An agent that queries an LLM for a plain completion.
///
/// The message history is flattened into a "role: content" transcript and
/// sent through the backend's generate endpoint.
pub struct LlmQueryAgent {
    name: String,
    description: String,
    system_instructions: String,
    backend: Arc<dyn LlmBackend>,
}

impl LlmQueryAgent {
    /// Create a new query agent
    pub fn new(name: impl Into<String>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_instructions: String::new(),
            backend,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system instructions prepended to every prompt
    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    /// Ask a single question, returning the raw completion
    pub async fn ask(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(MaestroError::validation("Invalid query: empty"));
        }
        let prompt = if self.system_instructions.is_empty() {
            query.to_string()
        } else {
            format!("{}\n\n{}", self.system_instructions, query)
        };
        self.backend.generate(&prompt).await
    }

    /// Run the query over a message history, appending the assistant response
    pub async fn run(&self, mut messages: MessageHistory) -> Result<MessageHistory> {
        if messages.is_empty() {
            return Err(MaestroError::validation(
                "Invalid messages: empty message history",
            ));
        }
        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let response = self.ask(&transcript).await?;
        messages.push(Message::assistant(response));
        Ok(messages)
    }
}

#[async_trait]
impl Agent for LlmQueryAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
        let messages = messages_from_inputs(&inputs)?;
        let updated = self.run(messages).await?;
        Ok(serde_json::to_value(updated)?)
    }
}

/// An agent that interacts with an LLM for chat and supports tool calls.
///
/// The tool-call loop is an explicit bounded loop: each turn sends the
/// history (with the synthetic system message prepended, never stored) and
/// the current tool schemas; tool calls in the response are invoked through
/// the registry and appended as tool-role messages. A failing tool never
/// aborts the loop; only a failing backend call does.
pub struct LlmChatAgent {
    name: String,
    description: String,
    system_instructions: String,
    max_tool_call_depth: u32,
    backend: Arc<dyn LlmBackend>,
    tool_registry: ToolRegistry,
}

impl LlmChatAgent {
    /// Create a new chat agent with default depth
    pub fn new(name: impl Into<String>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_instructions: String::new(),
            max_tool_call_depth: 2,
            backend,
            tool_registry: ToolRegistry::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system instructions injected on every backend call
    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    /// Set the maximum tool-call recursion depth
    pub fn with_max_tool_call_depth(mut self, depth: u32) -> Self {
        self.max_tool_call_depth = depth;
        self
    }

    /// Register a tool with this agent's registry
    pub fn register_tool(&mut self, tool: Tool) -> Result<()> {
        self.tool_registry.register_tool(tool)
    }

    /// Register multiple tools
    pub fn register_tools(&mut self, tools: impl IntoIterator<Item = Tool>) -> Result<()> {
        self.tool_registry.register_tools(tools)
    }

    /// The agent's tool registry
    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Build the outbound message list for one backend call.
    ///
    /// The system message is synthesized here on every call instead of being
    /// stored in the history, so recursion never has to strip it again.
    fn build_outbound(&self, messages: &MessageHistory) -> Vec<Message> {
        let mut outbound = Vec::with_capacity(messages.len() + 1);
        if !self.system_instructions.is_empty() {
            outbound.push(Message::system(self.system_instructions.clone()));
        }
        outbound.extend(messages.iter().cloned());
        outbound
    }

    /// Run the bounded tool-call loop over a message history.
    ///
    /// Terminates when the backend responds without tool calls, or when tool
    /// calls arrive at the maximum depth (their results are still appended,
    /// the backend is just not consulted again).
    pub async fn run_chat(&self, mut messages: MessageHistory) -> Result<MessageHistory> {
        if messages.is_empty() {
            return Err(MaestroError::validation("Invalid messages: empty list"));
        }

        let schemas = self.tool_registry.schemas();
        let mut depth = 0u32;

        loop {
            let outbound = self.build_outbound(&messages);
            let response = self.backend.chat(&outbound, &schemas).await?;
            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            messages.push(response);

            if tool_calls.is_empty() {
                break;
            }

            debug!(agent = %self.name, depth, count = tool_calls.len(), "handling tool calls");
            for call in &tool_calls {
                messages.push(self.handle_tool_call(call));
            }

            if depth >= self.max_tool_call_depth {
                warn!(agent = %self.name, depth, "max tool call depth reached");
                break;
            }
            depth += 1;
        }

        Ok(messages)
    }

    /// Invoke one tool call, converting any failure into a tool-role message
    /// the LLM can react to on the next turn.
    fn handle_tool_call(&self, call: &ToolCall) -> Message {
        match self.tool_registry.invoke_tool_call(call) {
            Ok(result) => {
                let content = serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|_| result.to_string());
                Message::tool(content)
            }
            Err(e) => {
                let errors = vec![
                    format!("Tool '{}' invocation failed", call.name),
                    e.to_string(),
                ];
                let content = serde_json::to_string_pretty(&errors)
                    .unwrap_or_else(|_| format!("{:?}", errors));
                Message::tool(content).with_errors(errors)
            }
        }
    }
}

#[async_trait]
impl Agent for LlmChatAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
        let messages = messages_from_inputs(&inputs)?;
        let updated = self.run_chat(messages).await?;
        Ok(serde_json::to_value(updated)?)
    }
}

/// A chat agent that keeps conversation state across invocations.
///
/// New messages are merged into the stored history before each run; the
/// store is capped at `max_state_size` messages with oldest-first eviction.
pub struct PersistentLlmChatAgent {
    inner: LlmChatAgent,
    state: Mutex<MessageHistory>,
    max_state_size: Option<usize>,
}

impl PersistentLlmChatAgent {
    /// Wrap a chat agent with persistent state
    pub fn new(inner: LlmChatAgent, max_state_size: Option<usize>) -> Self {
        Self {
            inner,
            state: Mutex::new(MessageHistory::new()),
            max_state_size,
        }
    }

    /// Run the tool-call loop over the stored state plus the new messages,
    /// returning the full updated history.
    pub async fn run_chat(&self, new_messages: MessageHistory) -> Result<MessageHistory> {
        let combined = {
            let mut state = self.state.lock().await;
            state.extend(new_messages);
            if let Some(max) = self.max_state_size {
                state.evict_oldest(max);
            }
            state.clone()
        };

        let before = combined.len();
        let updated = self.inner.run_chat(combined).await?;

        let mut state = self.state.lock().await;
        for message in updated.as_slice()[before..].iter().cloned() {
            state.push(message);
        }
        if let Some(max) = self.max_state_size {
            state.evict_oldest(max);
        }
        Ok(updated)
    }

    /// Snapshot of the stored history
    pub async fn state(&self) -> MessageHistory {
        self.state.lock().await.clone()
    }

    /// Clear the stored history
    pub async fn clear_state(&self) {
        *self.state.lock().await = MessageHistory::new();
    }
}

#[async_trait]
impl Agent for PersistentLlmChatAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
        let messages = messages_from_inputs(&inputs)?;
        let updated = self.run_chat(messages).await?;
        Ok(serde_json::to_value(updated)?)
    }
}
