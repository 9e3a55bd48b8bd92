//! Workflow module - agent nodes and the DAG execution engine

pub mod node;
pub mod viz;
#[allow(clippy::module_inception)]
pub mod workflow;

pub use node::{AgentNode, Node, WORKFLOW_INPUT};
pub use workflow::Workflow;
