//! Delegation agent
//!
//! Presents an LLM with a catalog of delegated tasks and lets it pick the
//! agent to handle an incoming request. Any decision failure degrades to a
//! designated generic agent, so callers always get a dispatched result.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::base::{messages_from_inputs, Agent, AgentInputs};
use crate::agent::registry::{call_agent, AgentRegistry, CallOptions};
use crate::core::{parse_json_with_recovery, MaestroError, Message, MessageHistory, Result};
use crate::llm::LlmBackend;

/// Reserved agent name the LLM uses to decline delegation
pub const GENERIC_AGENT: &str = "generic_agent";

/// A task delegated to a named agent, shown to the LLM as a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDelegation {
    /// Name of the agent responsible for the task
    pub agent_name: String,
    /// High-level description of the delegated task
    pub task_description: String,
    /// Description copied from the agent's metadata
    pub agent_description: String,
}

/// The structured decision expected back from the LLM
#[derive(Debug, Deserialize)]
struct Decision {
    agent_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// An agent that delegates tasks to other agents, or to a generic agent
/// when no delegate fits or the decision cannot be parsed.
pub struct DelegationAgent {
    name: String,
    description: String,
    backend: Arc<dyn LlmBackend>,
    registry: AgentRegistry,
    generic_agent: String,
    delegations: BTreeMap<String, TaskDelegation>,
    options: CallOptions,
}

impl std::fmt::Debug for DelegationAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("generic_agent", &self.generic_agent)
            .field("delegations", &self.delegations)
            .finish()
    }
}

impl DelegationAgent {
    /// Create a delegation agent. The generic agent must already be
    /// registered; it is the unconditional fallback for failed decisions.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn LlmBackend>,
        registry: AgentRegistry,
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
            description: "Delegates tasks to registered agents".to_string(),
            backend,
            registry,
            generic_agent,
            delegations: BTreeMap::new(),
            options: CallOptions::default(),
        })
    }

    /// Set the retry options used when dispatching to the chosen agent
    pub fn with_call_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a delegation entry for a registered agent
    pub fn delegate_task(
        &mut self,
        task_description: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Result<()> {
        let agent_name = agent_name.into();
        if self.delegations.contains_key(&agent_name) {
            return Err(MaestroError::registration(format!(
                "Agent '{}' already has a delegated task",
                agent_name
            )));
        }
        let agent = self.registry.get(&agent_name)?;
        self.delegations.insert(
            agent_name.clone(),
            TaskDelegation {
                agent_name,
                task_description: task_description.into(),
                agent_description: agent.description().to_string(),
            },
        );
        Ok(())
    }

    /// Remove a delegation entry. Unknown names are ignored.
    pub fn remove_delegation(&mut self, agent_name: &str) {
        self.delegations.remove(agent_name);
    }

    /// Current delegation catalog, ordered by agent name
    pub fn delegations(&self) -> Vec<&TaskDelegation> {
        self.delegations.values().collect()
    }

    fn decision_prompt(&self) -> String {
        let catalog: Vec<&TaskDelegation> = self.delegations.values().collect();
        let catalog_json = serde_json::to_string_pretty(&catalog).unwrap_or_default();
        format!(
            "You are a delegation agent responsible for assigning tasks to other \
             agents or handling tasks directly when delegation is not possible.\n\n\
             Agent task delegations:\n{catalog_json}\n\n\
             Instructions:\n\
             1. Review the task description and the list of available agents.\n\
             2. Select the best agent to perform the task.\n\
             3. If no agent is suitable, indicate that the task should be handled directly.\n\
             Respond with the following structure:\n\
             {{\n    \"agent_name\": \"<name_of_the_agent>\"\n}}\n\
             If no agent is suitable:\n\
             {{\n    \"agent_name\": \"{GENERIC_AGENT}\"\n}}\n\
             - Strictly adhere to the structure for successful delegation.\n\
             - Do not include any additional information in your response."
        )
    }

    /// Ask the LLM which agent should handle the conversation, then dispatch
    /// the original history to it. Falls back to the generic agent on an
    /// unparsable decision, a declined delegation, or an unknown agent name.
    /// Only a failing backend call propagates.
    pub async fn decide_and_delegate(&self, messages: MessageHistory) -> Result<Value> {
        if messages.is_empty() {
            return Err(MaestroError::validation("Invalid messages: empty list"));
        }

        let mut outbound = vec![Message::system(self.decision_prompt())];
        outbound.extend(messages.iter().cloned());
        let response = self.backend.chat(&outbound, &[]).await?;

        let chosen = self.parse_decision(&response.content);
        match chosen {
            Some(agent_name) if self.delegations.contains_key(&agent_name) => {
                info!(agent = %self.name, delegate = %agent_name, "delegating task");
                self.dispatch(&agent_name, messages).await
            }
            Some(agent_name) if agent_name == GENERIC_AGENT => {
                debug!(agent = %self.name, "delegation declined, using generic agent");
                self.dispatch_generic(messages).await
            }
            Some(agent_name) => {
                warn!(agent = %self.name, delegate = %agent_name, "chosen agent has no delegation");
                self.dispatch_generic(messages).await
            }
            None => {
                warn!(agent = %self.name, "undecodable delegation decision");
                self.dispatch_generic(messages).await
            }
        }
    }

    fn parse_decision(&self, content: &str) -> Option<String> {
        let value = parse_json_with_recovery(content).ok()?;
        let decision: Decision = serde_json::from_value(value).ok()?;
        if decision.error.is_some() {
            return None;
        }
        decision.agent_name
    }

    async fn dispatch(&self, agent_name: &str, messages: MessageHistory) -> Result<Value> {
        let mut inputs = AgentInputs::new();
        inputs.insert("messages".into(), serde_json::to_value(&messages)?);
        call_agent(&self.registry, agent_name, inputs, self.options.clone()).await
    }

    async fn dispatch_generic(&self, messages: MessageHistory) -> Result<Value> {
        self.dispatch(&self.generic_agent, messages).await
    }
}

#[async_trait]
impl Agent for DelegationAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
        let messages = messages_from_inputs(&inputs)?;
        self.decide_and_delegate(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct StaticAgent {
        name: String,
        description: String,
        reply: Value,
    }

    #[async_trait]
    impl Agent for StaticAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        async fn execute(&self, _inputs: AgentInputs) -> Result<Value> {
            Ok(self.reply.clone())
        }
    }

    /// Backend that always answers with one canned chat message
    struct CannedBackend {
        reply: Mutex<String>,
    }

    impl CannedBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(reply.to_string()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn chat(&self, _messages: &[Message], _tools: &[Value]) -> Result<Message> {
            Ok(Message::assistant(self.reply.lock().await.clone()))
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.lock().await.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn registry_with_candidates() -> AgentRegistry {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(StaticAgent {
                name: "DataSummarizer".into(),
                description: "Summarizes data".into(),
                reply: json!("summary done"),
            }))
            .unwrap();
        registry
            .register(Arc::new(StaticAgent {
                name: "DataLoader".into(),
                description: "Loads data".into(),
                reply: json!("data loaded"),
            }))
            .unwrap();
        registry
            .register(Arc::new(StaticAgent {
                name: "GenericAgent".into(),
                description: "Handles anything".into(),
                reply: json!("generic handled it"),
            }))
            .unwrap();
        registry
    }

    async fn delegate_with(decision: &str) -> Value {
        let registry = registry_with_candidates();
        let backend = CannedBackend::new(decision);
        let mut agent =
            DelegationAgent::new("Delegator", backend, registry, "GenericAgent").unwrap();
        agent
            .delegate_task("Summarize the sales report", "DataSummarizer")
            .unwrap();
        agent
            .delegate_task("Load the sales report", "DataLoader")
            .unwrap();

        agent
            .decide_and_delegate(MessageHistory::from_user("Summarize the data"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_decision_dispatches_to_named_agent() {
        let result = delegate_with(r#"{"agent_name": "DataSummarizer"}"#).await;
        assert_eq!(result, json!("summary done"));
    }

    #[tokio::test]
    async fn test_generic_sentinel_uses_generic_agent() {
        let result = delegate_with(r#"{"agent_name": "generic_agent"}"#).await;
        assert_eq!(result, json!("generic handled it"));
    }

    #[tokio::test]
    async fn test_unparsable_decision_falls_back() {
        let result = delegate_with("I refuse to answer in JSON.").await;
        assert_eq!(result, json!("generic handled it"));
    }

    #[tokio::test]
    async fn test_unknown_agent_falls_back() {
        let result = delegate_with(r#"{"agent_name": "NoSuchAgent"}"#).await;
        assert_eq!(result, json!("generic handled it"));
    }

    #[tokio::test]
    async fn test_error_decision_falls_back() {
        let result = delegate_with(r#"{"error": "no suitable agent"}"#).await;
        assert_eq!(result, json!("generic handled it"));
    }

    #[tokio::test]
    async fn test_unregistered_generic_agent_rejected() {
        let registry = AgentRegistry::new();
        let backend = CannedBackend::new("{}");
        let err = DelegationAgent::new("Delegator", backend, registry, "Missing").unwrap_err();
        assert!(matches!(err, MaestroError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delegating_unregistered_agent_fails() {
        let registry = registry_with_candidates();
        let backend = CannedBackend::new("{}");
        let mut agent =
            DelegationAgent::new("Delegator", backend, registry, "GenericAgent").unwrap();
        let err = agent.delegate_task("task", "Phantom").unwrap_err();
        assert!(matches!(err, MaestroError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_delegation_fails() {
        let registry = registry_with_candidates();
        let backend = CannedBackend::new("{}");
        let mut agent =
            DelegationAgent::new("Delegator", backend, registry, "GenericAgent").unwrap();
        agent.delegate_task("task", "DataLoader").unwrap();
        let err = agent.delegate_task("again", "DataLoader").unwrap_err();
        assert!(matches!(err, MaestroError::Registration(_)));
    }
}
