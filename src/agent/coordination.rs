//! Coordination agent
//!
//! Selects an agent out of one or more registry groups to handle a
//! conversation. The selection protocol mirrors the delegation agent but
//! draws its catalog from live registry metadata instead of a curated
//! delegation list.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::base::{messages_from_inputs, Agent, AgentInputs, AgentMetadata};
use crate::agent::registry::{call_agent, AgentRegistry, CallOptions};
use crate::core::{parse_json_with_recovery, MaestroError, Message, MessageHistory, Result};
use crate::llm::LlmBackend;

#[derive(Debug, Deserialize)]
struct Selection {
    agent_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// An agent that orchestrates tasks by routing a conversation to the most
/// suitable agent within its groups, with a generic agent as the fallback.
pub struct CoordinationAgent {
    name: String,
    description: String,
    backend: Arc<dyn LlmBackend>,
    registry: AgentRegistry,
    agents_groups: Vec<String>,
    generic_agent: String,
    options: CallOptions,
}

impl CoordinationAgent {
    /// Create a coordination agent over the given registry groups. The
    /// generic agent must already be registered.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn LlmBackend>,
        registry: AgentRegistry,
        agents_groups: Vec<String>,
        generic_agent: impl Into<String>,
    ) -> Result<Self> {
        let generic_agent = generic_agent.into();
        if !registry.contains(&generic_agent) {
            return Err(MaestroError::not_found(format!(
                "Generic agent '{}' is not registered",
                generic_agent
            )));
        }
        Ok(Self {
            name: name.into(),
            description: "Routes conversations to agents in its groups".to_string(),
            backend,
            registry,
            agents_groups,
            generic_agent,
            options: CallOptions::default(),
        })
    }

    /// Set the retry options used when dispatching to the chosen agent
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Metadata of every agent visible to this coordinator
    pub fn available_agents(&self) -> Vec<AgentMetadata> {
        self.agents_groups
            .iter()
            .flat_map(|group| self.registry.metadata(Some(group)))
            .collect()
    }

    fn selection_prompt(&self, available: &[AgentMetadata]) -> String {
        let catalog_json = serde_json::to_string_pretty(available).unwrap_or_default();
        format!(
            "You are an intelligent coordination agent responsible for orchestrating \
             tasks by calling other agents. You must select an appropriate agent.\n\n\
             Available Agents:\n{catalog_json}\n\n\
             Instructions:\n\
             1. Review the task description and the list of available agents.\n\
             2. Select the best agent to perform the task or subtask.\n\
             3. Ensure the agent_name is one of the available agents.\n\
             4. If no suitable agent is available, respond with:\n\
             {{\n    \"error\": \"No suitable agent found.\"\n}}\n\n\
             Generate the output with the following format:\n\
             {{\n    \"agent_name\": \"<agent_name>\"\n}}\n\
             - Strictly adhere to the provided format.\n\
             - Do not include your thought process or additional information."
        )
    }

    /// Select an agent for the conversation and dispatch the original
    /// history to it. Selection failures of any kind route to the generic
    /// agent; only a failing backend call propagates.
    pub async fn coordinate(&self, messages: MessageHistory) -> Result<Value> {
        if messages.is_empty() {
            return Err(MaestroError::validation("Invalid messages: empty list"));
        }

        let available = self.available_agents();
        let mut outbound = vec![Message::system(self.selection_prompt(&available))];
        outbound.extend(messages.iter().cloned());
        let response = self.backend.chat(&outbound, &[]).await?;

        match self.parse_selection(&response.content) {
            Some(agent_name) if available.iter().any(|m| m.name == agent_name) => {
                info!(agent = %self.name, selected = %agent_name, "coordinating to agent");
                self.dispatch(&agent_name, messages).await
            }
            Some(agent_name) => {
                warn!(agent = %self.name, selected = %agent_name, "selected agent not in groups");
                self.dispatch(&self.generic_agent, messages).await
            }
            None => {
                warn!(agent = %self.name, "undecodable coordination selection");
                self.dispatch(&self.generic_agent, messages).await
            }
        }
    }

    fn parse_selection(&self, content: &str) -> Option<String> {
        let value = parse_json_with_recovery(content).ok()?;
        let selection: Selection = serde_json::from_value(value).ok()?;
        if selection.error.is_some() {
            return None;
        }
        selection.agent_name
    }

    async fn dispatch(&self, agent_name: &str, messages: MessageHistory) -> Result<Value> {
        let mut inputs = AgentInputs::new();
        inputs.insert("messages".into(), serde_json::to_value(&messages)?);
        call_agent(&self.registry, agent_name, inputs, self.options.clone()).await
    }
}

#[async_trait]
impl Agent for CoordinationAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
        let messages = messages_from_inputs(&inputs)?;
        self.coordinate(messages).await
    }
}
