//! LLM module - backend abstraction with Ollama implementation

pub mod ollama;
pub mod traits;

pub use ollama::OllamaClient;
pub use traits::LlmBackend;
