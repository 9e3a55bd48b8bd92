//! Agent trait - the polymorphic unit of execution
//!
//! Agents map named inputs to a JSON result. Chat-style agents carry their
//! conversation in a `messages` input; workflow nodes bind arbitrary
//! parameters. Accepted and required parameter names are declared explicitly
//! so workflow input filtering needs no runtime introspection.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{MaestroError, MessageHistory, Result};

/// Named inputs passed to an agent execution
pub type AgentInputs = HashMap<String, Value>;

/// Metadata describing an agent, used in decision-layer catalogs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Unique registered name
    pub name: String,
    /// Human-readable description
    pub description: String,
}

/// A named unit that maps inputs to a result
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name of the agent
    fn name(&self) -> &str;

    /// Description of the agent's purpose
    fn description(&self) -> &str {
        ""
    }

    /// Parameter names this agent accepts from workflow bindings
    fn accepted_params(&self) -> Vec<String> {
        vec!["messages".to_string()]
    }

    /// Parameter names that must be present after input filtering
    fn required_params(&self) -> Vec<String> {
        vec!["messages".to_string()]
    }

    /// Execute the agent logic
    async fn execute(&self, inputs: AgentInputs) -> Result<Value>;

    /// Metadata for catalogs presented to decision agents
    fn metadata(&self) -> AgentMetadata {
        AgentMetadata {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .finish()
    }
}

/// Extract and deserialize the `messages` input of a chat-style agent
pub fn messages_from_inputs(inputs: &AgentInputs) -> Result<MessageHistory> {
    let value = inputs.get("messages").ok_or_else(|| {
        MaestroError::validation("Missing required input 'messages'")
    })?;
    serde_json::from_value(value.clone())
        .map_err(|e| MaestroError::validation(format!("Invalid 'messages' input: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;

    #[test]
    fn test_messages_from_inputs() {
        let mut history = MessageHistory::new();
        history.push(Message::user("hi"));

        let mut inputs = AgentInputs::new();
        inputs.insert("messages".into(), serde_json::to_value(&history).unwrap());

        let parsed = messages_from_inputs(&inputs).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_missing_messages_input() {
        let err = messages_from_inputs(&AgentInputs::new()).unwrap_err();
        assert!(matches!(err, MaestroError::Validation(_)));
    }
}
