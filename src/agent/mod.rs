//! Agent module - the agent trait, registry, and prebuilt agents

pub mod base;
pub mod coordination;
pub mod delegation;
pub mod llm_agent;
pub mod planning;
pub mod registry;

pub use base::{messages_from_inputs, Agent, AgentInputs, AgentMetadata};
pub use coordination::CoordinationAgent;
pub use delegation::{DelegationAgent, TaskDelegation, GENERIC_AGENT};
pub use llm_agent::{LlmChatAgent, LlmQueryAgent, PersistentLlmChatAgent};
pub use planning::{PlanExecutor, PlanGenerationAgent};
pub use registry::{call_agent, AgentRegistry, CallFallback, CallOptions};
