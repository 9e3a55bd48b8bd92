//! Agent registry and the retrying agent-call wrapper
//!
//! The registry is an explicit shared handle injected where needed, not a
//! process global. Dot-separated names ("sales.DataLoader") give agents a
//! group hierarchy that the decision layer filters on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::base::{Agent, AgentInputs, AgentMetadata};
use crate::core::{MaestroError, Result};

/// Process-wide lookup of agents by unique name
#[derive(Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Agent>>>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its unique name.
    /// Fails if the name is already taken.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<()> {
        let name = agent.name().to_string();
        let mut agents = self.write_guard();
        if agents.contains_key(&name) {
            return Err(MaestroError::registration(format!(
                "Agent name '{}' is already registered",
                name
            )));
        }
        debug!(agent = %name, "registered agent");
        agents.insert(name, agent);
        Ok(())
    }

    /// Unregister an agent by name. Unknown names are ignored.
    pub fn unregister(&self, name: &str) {
        self.write_guard().remove(name);
    }

    /// Retrieve an agent by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>> {
        self.read_guard().get(name).cloned().ok_or_else(|| {
            MaestroError::not_found(format!("Agent '{}' is not registered", name))
        })
    }

    /// Check whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.read_guard().contains_key(name)
    }

    /// List registered agent names, optionally filtered by a dot-group prefix
    pub fn list(&self, group: Option<&str>) -> Vec<String> {
        let agents = self.read_guard();
        let mut names: Vec<String> = match group {
            Some(group) => {
                let prefix = format!("{}.", group);
                agents
                    .keys()
                    .filter(|name| name.starts_with(&prefix))
                    .cloned()
                    .collect()
            }
            None => agents.keys().cloned().collect(),
        };
        names.sort();
        names
    }

    /// Metadata of registered agents, optionally filtered by group
    pub fn metadata(&self, group: Option<&str>) -> Vec<AgentMetadata> {
        let prefix = group.map(|group| format!("{}.", group));
        let agents = self.read_guard();
        let mut entries: Vec<AgentMetadata> = agents
            .iter()
            .filter(|(name, _)| match &prefix {
                Some(prefix) => name.starts_with(prefix.as_str()),
                None => true,
            })
            .map(|(_, agent)| agent.metadata())
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Remove all agents
    pub fn clear(&self) {
        self.write_guard().clear();
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn Agent>>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn Agent>>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fallback closure run after retries are exhausted
pub type CallFallback = Arc<dyn Fn(&AgentInputs) -> Value + Send + Sync>;

/// Options for [`call_agent`]
#[derive(Clone)]
pub struct CallOptions {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_backoff: Duration,
    /// Fallback run if all attempts fail
    pub fallback: Option<CallFallback>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff: Duration::from_millis(500),
            fallback: None,
        }
    }
}

impl CallOptions {
    /// No retries, no fallback
    pub fn once() -> Self {
        Self {
            max_retries: 0,
            retry_backoff: Duration::ZERO,
            fallback: None,
        }
    }
}

/// Call a registered agent by name with retry and fallback logic.
///
/// Required inputs are checked up front; the agent is then executed up to
/// `1 + max_retries` times with a fixed backoff between attempts. After
/// exhaustion the fallback runs if present, otherwise the last failure is
/// reported as a backend error naming the agent.
pub async fn call_agent(
    registry: &AgentRegistry,
    agent_name: &str,
    inputs: AgentInputs,
    options: CallOptions,
) -> Result<Value> {
    let agent = registry.get(agent_name)?;

    for required in agent.required_params() {
        if !inputs.contains_key(&required) {
            return Err(MaestroError::validation(format!(
                "Input validation failed for agent '{}': missing '{}'",
                agent_name, required
            )));
        }
    }

    let mut attempt = 0u32;
    loop {
        match agent.execute(inputs.clone()).await {
            Ok(result) => {
                info!(agent = %agent_name, attempt = attempt + 1, "agent call succeeded");
                return Ok(result);
            }
            Err(e) => {
                warn!(agent = %agent_name, attempt = attempt + 1, error = %e, "agent call failed");
                if attempt >= options.max_retries {
                    if let Some(fallback) = &options.fallback {
                        info!(agent = %agent_name, "retries exhausted, executing fallback");
                        return Ok(fallback(&inputs));
                    }
                    return Err(MaestroError::backend(format!(
                        "Agent '{}' execution failed after {} retries: {}",
                        agent_name, options.max_retries, e
                    )));
                }
                attempt += 1;
                tokio::time::sleep(options.retry_backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoAgent {
        name: String,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn accepted_params(&self) -> Vec<String> {
            vec!["text".to_string()]
        }

        fn required_params(&self) -> Vec<String> {
            vec!["text".to_string()]
        }

        async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
            Ok(inputs["text"].clone())
        }
    }

    /// Fails a fixed number of times before succeeding
    struct FlakyAgent {
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl Agent for FlakyAgent {
        fn name(&self) -> &str {
            "flaky"
        }

        fn required_params(&self) -> Vec<String> {
            Vec::new()
        }

        async fn execute(&self, _inputs: AgentInputs) -> Result<Value> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(MaestroError::backend("transient failure"))
            } else {
                Ok(json!("recovered"))
            }
        }
    }

    fn echo(name: &str) -> Arc<dyn Agent> {
        Arc::new(EchoAgent { name: name.into() })
    }

    #[test]
    fn test_register_and_get() {
        let registry = AgentRegistry::new();
        registry.register(echo("sales.Echo")).unwrap();
        assert!(registry.get("sales.Echo").is_ok());
        assert!(matches!(
            registry.get("missing").unwrap_err(),
            MaestroError::NotFound(_)
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = AgentRegistry::new();
        registry.register(echo("dup")).unwrap();
        assert!(matches!(
            registry.register(echo("dup")).unwrap_err(),
            MaestroError::Registration(_)
        ));
    }

    #[test]
    fn test_group_listing() {
        let registry = AgentRegistry::new();
        registry.register(echo("sales.Loader")).unwrap();
        registry.register(echo("sales.Summarizer")).unwrap();
        registry.register(echo("ops.Monitor")).unwrap();

        assert_eq!(
            registry.list(Some("sales")),
            vec!["sales.Loader".to_string(), "sales.Summarizer".to_string()]
        );
        assert_eq!(registry.list(None).len(), 3);
    }

    #[test]
    fn test_unregister() {
        let registry = AgentRegistry::new();
        registry.register(echo("temp")).unwrap();
        registry.unregister("temp");
        assert!(!registry.contains("temp"));
    }

    #[tokio::test]
    async fn test_call_agent_success() {
        let registry = AgentRegistry::new();
        registry.register(echo("echo")).unwrap();

        let mut inputs = AgentInputs::new();
        inputs.insert("text".into(), json!("hello"));
        let result = call_agent(&registry, "echo", inputs, CallOptions::once())
            .await
            .unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[tokio::test]
    async fn test_call_agent_missing_required_input() {
        let registry = AgentRegistry::new();
        registry.register(echo("echo")).unwrap();

        let err = call_agent(&registry, "echo", AgentInputs::new(), CallOptions::once())
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::Validation(_)));
    }

    #[tokio::test]
    async fn test_call_agent_retries_then_succeeds() {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(FlakyAgent {
                failures_left: AtomicU32::new(2),
            }))
            .unwrap();

        let options = CallOptions {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            fallback: None,
        };
        let result = call_agent(&registry, "flaky", AgentInputs::new(), options)
            .await
            .unwrap();
        assert_eq!(result, json!("recovered"));
    }

    #[tokio::test]
    async fn test_call_agent_fallback_after_exhaustion() {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(FlakyAgent {
                failures_left: AtomicU32::new(10),
            }))
            .unwrap();

        let options = CallOptions {
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            fallback: Some(Arc::new(|_| json!("fallback result"))),
        };
        let result = call_agent(&registry, "flaky", AgentInputs::new(), options)
            .await
            .unwrap();
        assert_eq!(result, json!("fallback result"));
    }

    #[tokio::test]
    async fn test_call_agent_exhaustion_without_fallback() {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(FlakyAgent {
                failures_left: AtomicU32::new(10),
            }))
            .unwrap();

        let options = CallOptions {
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            fallback: None,
        };
        let err = call_agent(&registry, "flaky", AgentInputs::new(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::Backend(_)));
        assert!(err.to_string().contains("flaky"));
    }
}
