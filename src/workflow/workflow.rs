//! Workflow DAG engine
//!
//! Nodes are added incrementally; every input source must already be a
//! graph member, which keeps the graph acyclic by construction. Execution
//! is sequential in topological order with a write-before-read guarantee:
//! a node runs strictly after every node it reads from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::agent::AgentInputs;
use crate::core::{MaestroError, Result};
use crate::workflow::node::{Node, WORKFLOW_INPUT};

/// A named DAG of agent nodes
pub struct Workflow {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    // Insertion order, kept for deterministic traversal
    order: Vec<String>,
}

impl Workflow {
    /// Create an empty workflow
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Name of the workflow
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node. Fails if the name is taken or an input source is not
    /// already a member of the graph.
    pub fn add_node(&mut self, node: impl Node + 'static) -> Result<()> {
        if self.nodes.contains_key(node.name()) {
            return Err(MaestroError::registration(format!(
                "Node '{}' already exists in workflow '{}'",
                node.name(),
                self.name
            )));
        }
        for (param, source) in node.inputs() {
            if source != WORKFLOW_INPUT && !self.nodes.contains_key(source) {
                return Err(MaestroError::dependency(format!(
                    "Input '{}' of node '{}' references unknown node '{}'",
                    param,
                    node.name(),
                    source
                )));
            }
        }
        debug!(workflow = %self.name, node = %node.name(), "added node");
        self.order.push(node.name().to_string());
        self.nodes.insert(node.name().to_string(), Arc::new(node));
        Ok(())
    }

    /// Get a node by name
    pub fn get_node(&self, name: &str) -> Result<&Arc<dyn Node>> {
        self.nodes.get(name).ok_or_else(|| {
            MaestroError::not_found(format!(
                "Node '{}' does not exist in workflow '{}'",
                name, self.name
            ))
        })
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<dyn Node>> {
        self.order.iter().filter_map(|name| self.nodes.get(name))
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the graph and fail on a cycle or a dangling input source
    pub fn validate_dependencies(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MaestroError::validation(format!(
                "Workflow '{}' has no nodes to validate",
                self.name
            )));
        }
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for name in &self.order {
            self.check_cycles(name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn check_cycles(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if stack.iter().any(|on_stack| on_stack == name) {
            return Err(MaestroError::Cycle(name.to_string()));
        }
        if visited.contains(name) {
            return Ok(());
        }
        visited.insert(name.to_string());
        stack.push(name.to_string());

        let node = self.get_node(name)?;
        for parent in node.parents() {
            if !self.nodes.contains_key(&parent) {
                return Err(MaestroError::dependency(format!(
                    "Node '{}' depends on unknown node '{}'",
                    name, parent
                )));
            }
            self.check_cycles(&parent, visited, stack)?;
        }

        stack.pop();
        Ok(())
    }

    /// Topological order via memoized post-order DFS: every node appears
    /// strictly after all of its parents.
    pub fn determine_execution_order(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for name in &self.order {
            self.order_visit(name, &mut visited, &mut order);
        }
        order
    }

    fn order_visit(&self, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if visited.contains(name) {
            return;
        }
        visited.insert(name.to_string());
        if let Some(node) = self.nodes.get(name) {
            for parent in node.parents() {
                self.order_visit(&parent, visited, order);
            }
            order.push(name.to_string());
        }
    }

    /// Execute every node in topological order, returning the results map
    /// keyed by node name. Each node executes exactly once, strictly after
    /// its parents.
    pub async fn execute(&self, inputs: AgentInputs) -> Result<HashMap<String, Value>> {
        self.validate_dependencies()?;
        let execution_order = self.determine_execution_order();
        info!(workflow = %self.name, nodes = execution_order.len(), "executing workflow");

        let mut results = HashMap::with_capacity(execution_order.len());
        for name in &execution_order {
            let node = self.get_node(name)?;
            let value = node.execute(&results, &inputs).await.map_err(|e| match e {
                // Resolution errors already name the node
                MaestroError::Backend(msg) => {
                    MaestroError::backend(format!("Node '{}': {}", name, msg))
                }
                other => other,
            })?;
            results.insert(name.clone(), value);
        }
        Ok(results)
    }
}
