//! Core module - shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod plan;
pub mod recovery;
pub mod types;

pub use config::{AgentConfig, Config, ModelConfig, OllamaConfig};
pub use error::{MaestroError, Result};
pub use plan::{ActionType, ErrorRecoveryStrategy, Plan, PlanStep, StepExecutionResult, StepStatus};
pub use recovery::parse_json_with_recovery;
pub use types::{Message, MessageHistory, Role, ToolCall};
