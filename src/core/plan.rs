//! Structured task plans
//!
//! A plan decomposes a task into ordered steps, each carrying its own
//! error-recovery policy. Plans are produced by an LLM and executed by
//! [`crate::agent::planning::PlanExecutor`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The type of action a plan step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Invoke a registered tool
    ToolCall,
    /// Invoke a registered agent
    AgentCall,
}

/// What to do when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRecoveryStrategy {
    /// Retry the step up to `max_retries` times
    Retry,
    /// Record the failure and move on to the next step
    Skip,
    /// Abort the plan, propagating the failure
    Terminate,
}

impl Default for ErrorRecoveryStrategy {
    fn default() -> Self {
        Self::Terminate
    }
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// A single step in a task plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// The type of action: tool_call or agent_call
    pub action: ActionType,
    /// The qualified tool name or agent name to invoke
    pub target: String,
    /// A brief description of the action
    pub description: String,
    /// The input data required for the action
    pub input: Map<String, Value>,
    /// Error recovery strategy: retry, skip, or terminate
    #[serde(default)]
    pub on_error: ErrorRecoveryStrategy,
    /// Maximum number of retries for the action
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff between retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Fallback input substituted on the final retry, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Map<String, Value>>,
}

/// A structured task plan containing multiple steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The high-level task description
    pub task: String,
    /// Additional context for the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// The ordered list of actions to execute
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Convert the plan to a JSON string formatted for an LLM prompt
    pub fn to_prompt(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Outcome of executing a single plan step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecutionResult {
    /// Index of the step in the plan
    pub step_index: usize,
    /// Description copied from the step
    pub description: String,
    /// Terminal status of the step
    pub status: StepStatus,
    /// Result value on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal status of a plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_type_wire_format() {
        assert_eq!(
            serde_json::to_value(ActionType::ToolCall).unwrap(),
            json!("tool_call")
        );
        assert_eq!(
            serde_json::to_value(ErrorRecoveryStrategy::Skip).unwrap(),
            json!("skip")
        );
    }

    #[test]
    fn test_plan_step_defaults() {
        let step: PlanStep = serde_json::from_value(json!({
            "action": "agent_call",
            "target": "sales.DataLoader",
            "description": "Load the data",
            "input": {"source": "sales.csv"}
        }))
        .unwrap();
        assert_eq!(step.on_error, ErrorRecoveryStrategy::Terminate);
        assert_eq!(step.max_retries, 1);
        assert_eq!(step.retry_backoff_ms, 500);
        assert!(step.fallback.is_none());
    }

    #[test]
    fn test_plan_to_prompt_round_trip() {
        let plan: Plan = serde_json::from_value(json!({
            "task": "Analyze sales data",
            "steps": [{
                "action": "tool_call",
                "target": "math.add",
                "description": "Add totals",
                "input": {"a": 1, "b": 2},
                "on_error": "retry",
                "max_retries": 3
            }]
        }))
        .unwrap();
        let prompt = plan.to_prompt();
        let parsed: Plan = serde_json::from_str(&prompt).unwrap();
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.steps[0].on_error, ErrorRecoveryStrategy::Retry);
    }
}
