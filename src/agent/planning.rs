//! Plan generation and execution
//!
//! `PlanGenerationAgent` asks an LLM to decompose a task into a structured
//! [`Plan`]; `PlanExecutor` runs the steps in order, applying each step's
//! own error-recovery policy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agent::base::AgentInputs;
use crate::agent::registry::{call_agent, AgentRegistry, CallOptions};
use crate::core::{
    parse_json_with_recovery, ActionType, ErrorRecoveryStrategy, MaestroError, Plan, PlanStep,
    Result, StepExecutionResult, StepStatus, ToolCall,
};
use crate::llm::LlmBackend;
use crate::tools::ToolRegistry;

const PLAN_SCHEMA_PROMPT: &str = r#"You are an expert planner tasked with designing a structured, executable plan for the following task.
You will receive a task description, goals, and constraints for the plan.
Provide a plan in the specified JSON format with detailed steps to accomplish the task.

Use the following JSON schema to define the plan:
{
  "steps": [
    {
      "action": "tool_call" | "agent_call",
      "target": "<qualified tool or agent name>",
      "description": "<description of the step>",
      "input": {"<name>": <value>, ...},
      "on_error": "retry" | "skip" | "terminate"
    },
    ...
  ]
}
Only use actions that are relevant to the task.
Do not make any assumptions about the task other than the given description and context.
Do not include any additional information in your output."#;

/// An agent that generates a structured plan for a task using an LLM
pub struct PlanGenerationAgent {
    name: String,
    backend: Arc<dyn LlmBackend>,
}

impl PlanGenerationAgent {
    /// Create a plan generation agent
    pub fn new(name: impl Into<String>, backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    fn planning_prompt(task: &str, goals: &[String], constraints: &[String]) -> String {
        let mut prompt = format!("{PLAN_SCHEMA_PROMPT}\n\nTask: {task}\n");
        if !goals.is_empty() {
            prompt.push_str("Goals:\n");
            for goal in goals {
                prompt.push_str(&format!("- {goal}\n"));
            }
        }
        if !constraints.is_empty() {
            prompt.push_str("Constraints:\n");
            for constraint in constraints {
                prompt.push_str(&format!("- {constraint}\n"));
            }
        }
        prompt
    }

    /// Generate a structured plan for the task.
    /// An unrecoverable response yields a [`MaestroError::DecisionParse`].
    pub async fn generate_plan(
        &self,
        task: &str,
        goals: &[String],
        constraints: &[String],
    ) -> Result<Plan> {
        info!(agent = %self.name, task, "generating plan");
        let prompt = Self::planning_prompt(task, goals, constraints);
        let response = self.backend.generate(&prompt).await?;

        let mut value = parse_json_with_recovery(&response)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("task".to_string(), Value::String(task.to_string()));
        }
        serde_json::from_value(value).map_err(|e| {
            MaestroError::decision_parse(format!("Generated plan does not match schema: {}", e))
        })
    }
}

/// Executes the steps of a [`Plan`] in order against the tool and agent
/// registries, honoring each step's error-recovery strategy.
///
/// Recovery semantics: `skip` records the failure and moves on; `retry`
/// re-runs the step up to its `max_retries`, substituting the fallback input
/// on the final attempt if one is declared; `terminate` (and `retry` after
/// exhaustion) aborts the plan with the step's error.
pub struct PlanExecutor {
    registry: AgentRegistry,
    tools: ToolRegistry,
}

impl PlanExecutor {
    /// Create an executor over the given registries
    pub fn new(registry: AgentRegistry, tools: ToolRegistry) -> Self {
        Self { registry, tools }
    }

    /// Execute all plan steps in order, returning the per-step log
    pub async fn execute_plan(&self, plan: &Plan) -> Result<Vec<StepExecutionResult>> {
        info!(task = %plan.task, steps = plan.steps.len(), "executing plan");
        let mut log = Vec::with_capacity(plan.steps.len());

        for (step_index, step) in plan.steps.iter().enumerate() {
            match self.execute_step(step).await {
                Ok(result) => {
                    log.push(StepExecutionResult {
                        step_index,
                        description: step.description.clone(),
                        status: StepStatus::Completed,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(e) => match step.on_error {
                    ErrorRecoveryStrategy::Skip => {
                        warn!(step_index, error = %e, "step failed, skipping");
                        log.push(StepExecutionResult {
                            step_index,
                            description: step.description.clone(),
                            status: StepStatus::Skipped,
                            result: None,
                            error: Some(e.to_string()),
                        });
                    }
                    ErrorRecoveryStrategy::Retry | ErrorRecoveryStrategy::Terminate => {
                        warn!(step_index, error = %e, "step failed, terminating plan");
                        return Err(MaestroError::backend(format!(
                            "Plan step {} ('{}') failed: {}",
                            step_index, step.description, e
                        )));
                    }
                },
            }
        }

        Ok(log)
    }

    /// Run one step, applying its retry policy
    async fn execute_step(&self, step: &PlanStep) -> Result<Value> {
        let retries = match step.on_error {
            ErrorRecoveryStrategy::Retry => step.max_retries,
            _ => 0,
        };

        let mut attempt = 0u32;
        loop {
            let is_final = attempt == retries;
            let input = match (&step.fallback, is_final && attempt > 0) {
                (Some(fallback), true) => fallback,
                _ => &step.input,
            };
            match self.run_action(step, input).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < retries => {
                    warn!(target = %step.target, attempt = attempt + 1, error = %e, "step attempt failed");
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(step.retry_backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Dispatch a step's action to the tool or agent registry
    async fn run_action(&self, step: &PlanStep, input: &Map<String, Value>) -> Result<Value> {
        match step.action {
            ActionType::ToolCall => {
                let call = ToolCall::new(step.target.clone(), input.clone());
                self.tools.invoke_tool_call(&call)
            }
            ActionType::AgentCall => {
                let inputs: AgentInputs = input
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                call_agent(&self.registry, &step.target, inputs, CallOptions::once()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::base::Agent;
    use crate::core::Message;
    use async_trait::async_trait;
    use crate::tools::{ParamType, Tool};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CannedBackend {
        reply: String,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn chat(&self, _messages: &[Message], _tools: &[Value]) -> Result<Message> {
            Ok(Message::assistant(self.reply.clone()))
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct UppercaseAgent;

    #[async_trait]
    impl Agent for UppercaseAgent {
        fn name(&self) -> &str {
            "Uppercase"
        }

        fn accepted_params(&self) -> Vec<String> {
            vec!["text".to_string()]
        }

        fn required_params(&self) -> Vec<String> {
            vec!["text".to_string()]
        }

        async fn execute(&self, inputs: AgentInputs) -> Result<Value> {
            let text = inputs["text"].as_str().unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }
    }

    fn add_tool() -> Tool {
        Tool::builder("math", "add")
            .description("Add two integers")
            .required_param("a", ParamType::Integer, "First addend")
            .required_param("b", ParamType::Integer, "Second addend")
            .handler(|args| {
                let a = args["a"].as_i64().unwrap_or_default();
                let b = args["b"].as_i64().unwrap_or_default();
                Ok(Value::from(a + b))
            })
    }

    fn flaky_tool(failures: u32) -> Tool {
        let remaining = Arc::new(AtomicU32::new(failures));
        Tool::builder("test", "flaky")
            .description("Fails a fixed number of times")
            .handler(move |_| {
                if remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                    Err(MaestroError::tool("transient failure"))
                } else {
                    Ok(json!("ok"))
                }
            })
    }

    fn executor_with(tools: Vec<Tool>) -> PlanExecutor {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(UppercaseAgent)).unwrap();
        let mut tool_registry = ToolRegistry::new();
        tool_registry.register_tools(tools).unwrap();
        PlanExecutor::new(registry, tool_registry)
    }

    fn plan_from(steps: Value) -> Plan {
        serde_json::from_value(json!({"task": "test task", "steps": steps})).unwrap()
    }

    #[tokio::test]
    async fn test_tool_and_agent_steps_complete() {
        let executor = executor_with(vec![add_tool()]);
        let plan = plan_from(json!([
            {
                "action": "tool_call",
                "target": "math.add",
                "description": "Add numbers",
                "input": {"a": 2, "b": 3}
            },
            {
                "action": "agent_call",
                "target": "Uppercase",
                "description": "Uppercase text",
                "input": {"text": "done"}
            }
        ]));

        let log = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, StepStatus::Completed);
        assert_eq!(log[0].result, Some(json!(5)));
        assert_eq!(log[1].result, Some(json!("DONE")));
    }

    #[tokio::test]
    async fn test_retry_step_recovers() {
        let executor = executor_with(vec![flaky_tool(2)]);
        let plan = plan_from(json!([{
            "action": "tool_call",
            "target": "test.flaky",
            "description": "Flaky step",
            "input": {},
            "on_error": "retry",
            "max_retries": 2,
            "retry_backoff_ms": 1
        }]));

        let log = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(log[0].status, StepStatus::Completed);
        assert_eq!(log[0].result, Some(json!("ok")));
    }

    #[tokio::test]
    async fn test_skip_step_continues() {
        let executor = executor_with(vec![add_tool()]);
        let plan = plan_from(json!([
            {
                "action": "tool_call",
                "target": "missing.tool",
                "description": "Doomed step",
                "input": {},
                "on_error": "skip"
            },
            {
                "action": "tool_call",
                "target": "math.add",
                "description": "Add numbers",
                "input": {"a": 1, "b": 1}
            }
        ]));

        let log = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(log[0].status, StepStatus::Skipped);
        assert!(log[0].error.as_deref().unwrap().contains("missing.tool"));
        assert_eq!(log[1].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminate_step_aborts_plan() {
        let executor = executor_with(vec![]);
        let plan = plan_from(json!([{
            "action": "tool_call",
            "target": "missing.tool",
            "description": "Doomed step",
            "input": {}
        }]));

        let err = executor.execute_plan(&plan).await.unwrap_err();
        assert!(err.to_string().contains("Doomed step"));
    }

    #[tokio::test]
    async fn test_fallback_input_on_final_retry() {
        // Rejects "bad", accepts anything else
        let tool = Tool::builder("test", "picky")
            .description("Rejects the bad input")
            .required_param("mode", ParamType::String, "Input mode")
            .handler(|args| {
                if args["mode"] == json!("bad") {
                    Err(MaestroError::tool("bad mode"))
                } else {
                    Ok(json!("accepted"))
                }
            });
        let executor = executor_with(vec![tool]);
        let plan = plan_from(json!([{
            "action": "tool_call",
            "target": "test.picky",
            "description": "Picky step",
            "input": {"mode": "bad"},
            "on_error": "retry",
            "max_retries": 1,
            "retry_backoff_ms": 1,
            "fallback": {"mode": "good"}
        }]));

        let log = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(log[0].result, Some(json!("accepted")));
    }

    #[tokio::test]
    async fn test_generate_plan_from_fenced_response() {
        let reply = "Here is the plan:\n```json\n{\"steps\": [{\"action\": \"tool_call\", \
                     \"target\": \"math.add\", \"description\": \"Add\", \"input\": {\"a\": 1, \"b\": 2}}]}\n```";
        let agent = PlanGenerationAgent::new(
            "Planner",
            Arc::new(CannedBackend {
                reply: reply.to_string(),
            }),
        );

        let plan = agent.generate_plan("Add numbers", &[], &[]).await.unwrap();
        assert_eq!(plan.task, "Add numbers");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].target, "math.add");
    }

    #[tokio::test]
    async fn test_generate_plan_rejects_prose() {
        let agent = PlanGenerationAgent::new(
            "Planner",
            Arc::new(CannedBackend {
                reply: "I have no plan.".to_string(),
            }),
        );
        let err = agent.generate_plan("task", &[], &[]).await.unwrap_err();
        assert!(matches!(err, MaestroError::DecisionParse(_)));
    }
}
