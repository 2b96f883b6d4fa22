//! Tool Executor
//!
//! Information Hiding:
//! - Argument validation and timeout enforcement hidden
//! - Tool errors folded into failed `ToolResult`s

use super::{Tool, ToolConfig, ToolResult};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// Runs one tool call; never retries
pub struct ToolExecutor {
    config: ToolConfig,
}

impl ToolExecutor {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, tool: Arc<dyn Tool>, args: Value) -> Result<ToolResult> {
        let tool_name = tool.metadata().name;

        if let Err(e) = tool.validate(&args) {
            tracing::debug!("Tool '{}' rejected arguments: {}", tool_name, e);
            return Ok(ToolResult::failure(format!("Invalid input: {}", e)));
        }

        match timeout(Duration::from_secs(self.config.timeout_secs), tool.execute(args)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Ok(ToolResult::failure(format!("{:#}", e))),
            Err(_) => Ok(ToolResult::failure(format!(
                "Tool '{}' timed out after {}s",
                tool_name, self.config.timeout_secs
            ))),
        }
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolMetadata, ToolParameter};
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "echo".to_string(),
                description: "Echo the input".to_string(),
                parameters: vec![ToolParameter {
                    name: "text".to_string(),
                    param_type: "string".to_string(),
                    description: "Text".to_string(),
                    required: true,
                }],
            }
        }

        fn validate(&self, args: &Value) -> Result<()> {
            crate::tools::string_arg(args, "text").map(|_| ())
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            let text = crate::tools::string_arg(&args, "text")?;
            if text == "boom" {
                return Err(anyhow::anyhow!("exploded"));
            }
            if text == "slow" {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            Ok(ToolResult::success(text))
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = ToolExecutor::default()
            .execute(Arc::new(EchoTool), serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hi");
    }

    #[tokio::test]
    async fn test_errors_become_failures() {
        let executor = ToolExecutor::default();

        let invalid = executor
            .execute(Arc::new(EchoTool), serde_json::json!({}))
            .await
            .unwrap();
        assert!(!invalid.success);
        assert!(invalid.error.unwrap().starts_with("Invalid input"));

        let failed = executor
            .execute(Arc::new(EchoTool), serde_json::json!({"text": "boom"}))
            .await
            .unwrap();
        assert_eq!(failed.error.as_deref(), Some("exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let executor = ToolExecutor::new(ToolConfig { timeout_secs: 5 });
        let result = executor
            .execute(Arc::new(EchoTool), serde_json::json!({"text": "slow"}))
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("timed out"));
    }
}
