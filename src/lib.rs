//! Maestro - LLM Agent Orchestration Framework
//!
//! A Rust framework for composing LLM-backed agents into workflows, using
//! Ollama for local inference.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, plans, and error handling
//! - **LLM**: LLM backend abstraction with Ollama implementation
//! - **Tools**: Tool registry with declarative parameter schemas
//! - **Agent**: Agent trait, registry, chat/query agents, and the
//!   delegation, coordination, and planning layers
//! - **Workflow**: Agent nodes and the DAG execution engine
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maestro::agent::LlmChatAgent;
//! use maestro::core::{Config, MessageHistory};
//! use maestro::llm::OllamaClient;
//!
//! #[tokio::main]
//! async fn main() -> maestro::core::Result<()> {
//!     let config = Config::load();
//!     let backend = Arc::new(OllamaClient::from_config(&config)?);
//!     let agent = LlmChatAgent::new("assistant", backend)
//!         .with_system_instructions("You are a helpful assistant.");
//!
//!     let history = agent.run_chat(MessageHistory::from_user("Hello!")).await?;
//!     println!("{}", history.last().map(|m| m.content.as_str()).unwrap_or(""));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod core;
pub mod llm;
pub mod tools;
pub mod workflow;

// Re-export commonly used items
pub use agent::{Agent, AgentRegistry};
pub use core::{Config, MaestroError, Result};
pub use workflow::{AgentNode, Workflow};
