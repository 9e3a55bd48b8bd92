//! Custom error types for Maestro
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Maestro operations
#[derive(Error, Debug)]
pub enum MaestroError {
    /// Duplicate agent or tool name at registration
    #[error("Registration error: {0}")]
    Registration(String),

    /// Unregistered agent, tool, or node reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed messages or missing/mistyped tool arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Workflow dependency cycle
    #[error("Circular dependency detected involving '{0}'")]
    Cycle(String),

    /// Missing input source or not-yet-produced result
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// LLM backend call failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Structured decision from the LLM could not be parsed
    #[error("Decision parse error: {0}")]
    DecisionParse(String),

    /// Tool body failure, propagated unchanged from the handler
    #[error("Tool error: {0}")]
    Tool(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for Maestro operations
pub type Result<T> = std::result::Result<T, MaestroError>;

impl MaestroError {
    /// Create a registration error
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a dependency error
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a decision parse error
    pub fn decision_parse(msg: impl Into<String>) -> Self {
        Self::DecisionParse(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
