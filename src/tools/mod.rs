//! Tool System - SQL tools the agent can call
//!
//! Information Hiding:
//! - Tool execution details hidden behind trait
//! - Tool parameters and schemas hidden in implementations
//! - Registry implementation details hidden from consumers
//! - Errors become observations the agent can react to

pub mod executor;
pub mod registry;
pub mod sql;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Tool parameter schema definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: String,
    pub description: String,
    pub required: bool,
}

/// Tool metadata - describes what the tool does and how to use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl fmt::Display for ToolMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.description)
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata (name, description, parameters)
    fn metadata(&self) -> ToolMetadata;

    /// Execute the tool with given arguments
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, _args: &Value) -> Result<()> {
        Ok(())
    }
}

/// Tool execution configuration
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Pull a string argument, accepting a bare string in place of an object
pub(crate) fn string_arg(args: &Value, name: &str) -> Result<String> {
    let value = match args {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => args[name].as_str(),
        _ => None,
    };

    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(anyhow::anyhow!("'{}' cannot be empty", name)),
        None => Err(anyhow::anyhow!(
            "'{}' parameter is required and must be a string",
            name
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_arg_forms() {
        assert_eq!(string_arg(&json!({"query": " SELECT 1 "}), "query").unwrap(), "SELECT 1");
        assert_eq!(string_arg(&json!("SELECT 1"), "query").unwrap(), "SELECT 1");
        assert!(string_arg(&json!({"query": ""}), "query").is_err());
        assert!(string_arg(&json!({"sql": "x"}), "query").is_err());
        assert!(string_arg(&json!(42), "query").is_err());
    }
}
