//! Tool registry - manages and dispatches tool calls
//!
//! Tools carry a declarative parameter schema attached at registration time.
//! The registry validates and coerces arguments from structured LLM tool-call
//! output before invoking the handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::core::{MaestroError, Result, ToolCall};

/// Declared primitive type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

/// A single parameter in a tool's schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProperty {
    /// Declared type of the parameter
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Description shown to the LLM
    pub description: String,
}

/// Parameter schema of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameters {
    /// Parameter properties keyed by name, ordered for stable schemas
    pub properties: BTreeMap<String, ToolProperty>,
    /// Names of required parameters
    pub required: Vec<String>,
}

/// Handler invoked with the validated, coerced argument map
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> Result<Value> + Send + Sync>;

/// A registered callable with a declared parameter schema
#[derive(Clone)]
pub struct Tool {
    /// Qualified name, `namespace.function`
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// Parameter schema
    pub parameters: ToolParameters,
    handler: ToolHandler,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Tool {
    /// Start building a tool. The qualified name is `namespace.name`,
    /// which keeps identically named functions from colliding across agents.
    pub fn builder(namespace: impl Into<String>, name: impl Into<String>) -> ToolBuilder {
        ToolBuilder {
            namespace: namespace.into(),
            name: name.into(),
            description: String::new(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// LLM wire schema: `{"type": "function", "function": {..}}`
    pub fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": self.parameters.properties,
                    "required": self.parameters.required,
                },
            },
        })
    }

    /// Validate an argument map against the schema, returning a coerced copy.
    ///
    /// Required keys must be present. Values must match the declared type;
    /// numeric strings are coerced when the schema demands an integer or
    /// float. Arguments not in the schema are rejected.
    pub fn validate_arguments(&self, arguments: &Map<String, Value>) -> Result<Map<String, Value>> {
        for key in &self.parameters.required {
            if !arguments.contains_key(key) {
                return Err(MaestroError::validation(format!(
                    "Missing required argument '{}' for tool '{}'",
                    key, self.name
                )));
            }
        }

        let mut coerced = Map::new();
        for (key, value) in arguments {
            let property = self.parameters.properties.get(key).ok_or_else(|| {
                MaestroError::validation(format!(
                    "Unexpected argument '{}' for tool '{}'",
                    key, self.name
                ))
            })?;
            coerced.insert(key.clone(), coerce_value(key, value, property.param_type)?);
        }
        Ok(coerced)
    }

    /// Validate arguments and call the handler. Handler errors propagate
    /// unchanged; converting them into tool-role messages happens one layer
    /// up, in the agent loop.
    pub fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value> {
        let coerced = self.validate_arguments(arguments)?;
        (self.handler)(&coerced)
    }
}

/// Check a value against a declared type, coercing numeric strings
fn coerce_value(key: &str, value: &Value, expected: ParamType) -> Result<Value> {
    let mismatch = || {
        MaestroError::validation(format!(
            "Argument '{}' must be of type {}",
            key,
            expected.as_str()
        ))
    };

    match expected {
        ParamType::String => value.is_string().then(|| value.clone()).ok_or_else(mismatch),
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Float => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => value.is_boolean().then(|| value.clone()).ok_or_else(mismatch),
        ParamType::Object => value.is_object().then(|| value.clone()).ok_or_else(mismatch),
        ParamType::Array => value.is_array().then(|| value.clone()).ok_or_else(mismatch),
    }
}

/// Builder for [`Tool`]
pub struct ToolBuilder {
    namespace: String,
    name: String,
    description: String,
    properties: BTreeMap<String, ToolProperty>,
    required: Vec<String>,
}

impl ToolBuilder {
    /// Set the tool description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a required parameter
    pub fn required_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(
            name,
            ToolProperty {
                param_type,
                description: description.into(),
            },
        );
        self
    }

    /// Declare an optional parameter
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.properties.insert(
            name.into(),
            ToolProperty {
                param_type,
                description: description.into(),
            },
        );
        self
    }

    /// Attach the handler and finish the tool
    pub fn handler<F>(self, handler: F) -> Tool
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Tool {
            name: format!("{}.{}", self.namespace, self.name),
            description: self.description,
            parameters: ToolParameters {
                properties: self.properties,
                required: self.required,
            },
            handler: Arc::new(handler),
        }
    }
}

/// Registry of tools owned by one agent
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the qualified name is already taken.
    pub fn register_tool(&mut self, tool: Tool) -> Result<()> {
        if self.tools.contains_key(&tool.name) {
            return Err(MaestroError::registration(format!(
                "Tool '{}' is already registered",
                tool.name
            )));
        }
        debug!(tool = %tool.name, "registered tool");
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register multiple tools
    pub fn register_tools(&mut self, tools: impl IntoIterator<Item = Tool>) -> Result<()> {
        for tool in tools {
            self.register_tool(tool)?;
        }
        Ok(())
    }

    /// Get a registered tool by qualified name
    pub fn get_tool(&self, name: &str) -> Result<&Tool> {
        self.tools.get(name).ok_or_else(|| {
            MaestroError::not_found(format!("Tool '{}' is not registered", name))
        })
    }

    /// All registered tools, ordered by name
    pub fn list_tools(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// LLM wire schemas of all registered tools
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(Tool::schema).collect()
    }

    /// Look up the named tool, validate the arguments, and invoke it
    pub fn invoke_tool_call(&self, tool_call: &ToolCall) -> Result<Value> {
        let tool = self.get_tool(&tool_call.name)?;
        debug!(tool = %tool.name, "invoking tool call");
        tool.invoke(&tool_call.arguments)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Remove all tools
    pub fn clear(&mut self) {
        self.tools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

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

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall::new(name, arguments.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(add_tool().name, "math.add");
    }

    #[test]
    fn test_invoke_with_coercion() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(add_tool()).unwrap();

        // Numeric string coerced to integer
        let result = registry
            .invoke_tool_call(&call("math.add", json!({"a": 2, "b": "3"})))
            .unwrap();
        assert_eq!(result, Value::from(5));
    }

    #[test]
    fn test_missing_required_argument() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(add_tool()).unwrap();

        let err = registry
            .invoke_tool_call(&call("math.add", json!({"a": 2})))
            .unwrap_err();
        assert!(matches!(err, MaestroError::Validation(_)));
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn test_validation_runs_before_handler() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let tool = Tool::builder("test", "probe")
            .required_param("x", ParamType::Integer, "probe input")
            .handler(move |_| {
                ran_clone.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            });

        let mut registry = ToolRegistry::new();
        registry.register_tool(tool).unwrap();
        assert!(registry
            .invoke_tool_call(&call("test.probe", json!({})))
            .is_err());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_type_mismatch() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(add_tool()).unwrap();

        let err = registry
            .invoke_tool_call(&call("math.add", json!({"a": 2, "b": "not a number"})))
            .unwrap_err();
        assert!(matches!(err, MaestroError::Validation(_)));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(add_tool()).unwrap();
        let err = registry.register_tool(add_tool()).unwrap_err();
        assert!(matches!(err, MaestroError::Registration(_)));
    }

    #[test]
    fn test_unregistered_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke_tool_call(&call("missing.tool", json!({})))
            .unwrap_err();
        assert!(matches!(err, MaestroError::NotFound(_)));
    }

    #[test]
    fn test_get_tool_deterministic() {
        let mut registry = ToolRegistry::new();
        registry.register_tool(add_tool()).unwrap();
        let first = registry.get_tool("math.add").unwrap().schema();
        let second = registry.get_tool("math.add").unwrap().schema();
        assert_eq!(first, second);
    }

    #[test]
    fn test_handler_error_propagates() {
        let tool = Tool::builder("fs", "read")
            .required_param("path", ParamType::String, "File path")
            .handler(|_| Err(MaestroError::tool("permission denied")));

        let mut registry = ToolRegistry::new();
        registry.register_tool(tool).unwrap();
        let err = registry
            .invoke_tool_call(&call("fs.read", json!({"path": "/etc/shadow"})))
            .unwrap_err();
        assert!(matches!(err, MaestroError::Tool(_)));
    }
}
