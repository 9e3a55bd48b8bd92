//! DOT export of a workflow graph
//!
//! Produces Graphviz source so a workflow can be rendered with `dot -Tpng`.
//! Not part of the execution contract.

use std::fmt::Write;

use crate::workflow::node::{Node, WORKFLOW_INPUT};
use crate::workflow::workflow::Workflow;

impl Workflow {
    /// Render the graph as Graphviz DOT source. Input bindings become
    /// labeled edges; the workflow-input sentinel is drawn as a dashed node
    /// when any binding references it.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape(self.name()));
        let _ = writeln!(dot, "    rankdir=LR;");
        let _ = writeln!(dot, "    node [shape=box];");

        let uses_workflow_input = self
            .nodes()
            .any(|node| node.inputs().values().any(|s| s == WORKFLOW_INPUT));
        if uses_workflow_input {
            let _ = writeln!(
                dot,
                "    \"{WORKFLOW_INPUT}\" [shape=ellipse, style=dashed];"
            );
        }

        for node in self.nodes() {
            let _ = writeln!(dot, "    \"{}\";", escape(node.name()));
        }
        for node in self.nodes() {
            let mut bindings: Vec<(&String, &String)> = node.inputs().iter().collect();
            bindings.sort();
            for (param, source) in bindings {
                let _ = writeln!(
                    dot,
                    "    \"{}\" -> \"{}\" [label=\"{}\"];",
                    escape(source),
                    escape(node.name()),
                    escape(param)
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
