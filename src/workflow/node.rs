//! Workflow nodes
//!
//! An `AgentNode` wraps an agent and declares where each of its input
//! parameters comes from: a prior node's result or the workflow-level
//! inputs via the reserved `workflow_input` source.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::agent::{Agent, AgentInputs};
use crate::core::{MaestroError, Result};

/// Reserved input source naming the workflow-level inputs
pub const WORKFLOW_INPUT: &str = "workflow_input";

/// A unit of the workflow graph
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique name of the node
    fn name(&self) -> &str;

    /// Input bindings, parameter name to source node name
    fn inputs(&self) -> &HashMap<String, String>;

    /// Distinct parent node names, sorted. The workflow-input sentinel is
    /// not a parent.
    fn parents(&self) -> Vec<String> {
        let mut parents: Vec<String> = self
            .inputs()
            .values()
            .filter(|source| source.as_str() != WORKFLOW_INPUT)
            .cloned()
            .collect();
        parents.sort();
        parents.dedup();
        parents
    }

    /// Run the node against prior results and workflow-level inputs
    async fn execute(
        &self,
        results: &HashMap<String, Value>,
        workflow_inputs: &AgentInputs,
    ) -> Result<Value>;
}

/// A node that executes a wrapped agent with explicit input bindings
#[derive(Clone)]
pub struct AgentNode {
    name: String,
    agent: Arc<dyn Agent>,
    inputs: HashMap<String, String>,
}

impl AgentNode {
    /// Create a node wrapping an agent
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        Self {
            name: name.into(),
            agent,
            inputs: HashMap::new(),
        }
    }

    /// Bind an input parameter to a source node (or [`WORKFLOW_INPUT`])
    pub fn with_input(mut self, param: impl Into<String>, source: impl Into<String>) -> Self {
        self.inputs.insert(param.into(), source.into());
        self
    }

    /// Resolve this node's inputs from prior results and workflow inputs.
    ///
    /// Bound parameters are read from their source node's result (or the
    /// workflow inputs for the sentinel); unbound workflow inputs are then
    /// merged in without overriding resolved values. The combined map is
    /// filtered to the parameters the agent accepts, and every required
    /// parameter must survive the filtering.
    pub fn resolve_inputs(
        &self,
        results: &HashMap<String, Value>,
        workflow_inputs: &AgentInputs,
    ) -> Result<AgentInputs> {
        let mut combined = AgentInputs::new();
        for (param, source) in &self.inputs {
            let value = if source == WORKFLOW_INPUT {
                workflow_inputs.get(param).ok_or_else(|| {
                    MaestroError::dependency(format!(
                        "Node '{}' binds '{}' to the workflow inputs, but no such input was provided",
                        self.name, param
                    ))
                })?
            } else {
                results.get(source).ok_or_else(|| {
                    MaestroError::dependency(format!(
                        "Node '{}' requires the result of '{}', which has not been produced",
                        self.name, source
                    ))
                })?
            };
            combined.insert(param.clone(), value.clone());
        }

        for (key, value) in workflow_inputs {
            combined.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let accepted = self.agent.accepted_params();
        combined.retain(|key, _| accepted.iter().any(|param| param == key));

        for required in self.agent.required_params() {
            if !combined.contains_key(&required) {
                return Err(MaestroError::validation(format!(
                    "Required parameter '{}' is missing for node '{}'",
                    required, self.name
                )));
            }
        }

        Ok(combined)
    }
}

#[async_trait]
impl Node for AgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &HashMap<String, String> {
        &self.inputs
    }

    /// Resolve inputs and run the wrapped agent exactly once
    async fn execute(
        &self,
        results: &HashMap<String, Value>,
        workflow_inputs: &AgentInputs,
    ) -> Result<Value> {
        let inputs = self.resolve_inputs(results, workflow_inputs)?;
        debug!(node = %self.name, agent = %self.agent.name(), "executing node");
        self.agent.execute(inputs).await
    }
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .field("inputs", &self.inputs)
            .finish()
    }
}
