//! Tool Registry
//!
//! Information Hiding:
//! - Tool storage and lookup implementation hidden
//! - Registration order preserved so prompts are stable

use super::sql::{ListTablesTool, QueryCheckerTool, QueryTool, SchemaTool};
use super::{Tool, ToolMetadata};
use crate::core::llm::ChatModel;
use crate::database::SqlDatabase;
use std::collections::HashMap;
use std::sync::Arc;

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a new tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name;
        tracing::debug!("Registering tool: {}", name);
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Get all tool metadata
    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.metadata())
            .collect()
    }

    /// Get tool metadata as formatted string for LLM prompts
    pub fn tools_description(&self) -> String {
        let mut descriptions = Vec::new();
        for metadata in self.list_tools() {
            let params = if metadata.parameters.is_empty() {
                "  (none)".to_string()
            } else {
                metadata
                    .parameters
                    .iter()
                    .map(|p| {
                        let required = if p.required { "required" } else { "optional" };
                        format!("  - {} ({}): {} [{}]", p.name, p.param_type, p.description, required)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };

            descriptions.push(format!(
                "Tool: {}\nDescription: {}\nParameters:\n{}",
                metadata.name, metadata.description, params
            ));
        }
        descriptions.join("\n\n")
    }

    /// The SQL toolkit over one database handle
    pub fn for_database(db: Arc<dyn SqlDatabase>, model: Arc<dyn ChatModel>, max_rows: usize) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(QueryTool::new(db.clone(), max_rows)));
        registry.register(Arc::new(SchemaTool::new(db.clone())));
        registry.register(Arc::new(ListTablesTool::new(db.clone())));
        registry.register(Arc::new(QueryCheckerTool::new(db, model)));

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChatMessage;
    use crate::database::provider::tests::StubDatabase;
    use crate::tools::sql::{LIST_TABLES, QUERY, QUERY_CHECKER, SCHEMA};
    use async_trait::async_trait;

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::for_database(Arc::new(StubDatabase), Arc::new(SilentModel), 10)
    }

    #[test]
    fn test_sql_toolkit_registered_in_order() {
        let registry = registry();

        assert_eq!(registry.tool_names(), vec![QUERY, SCHEMA, LIST_TABLES, QUERY_CHECKER]);
        assert!(registry.get("execute_shell").is_none());
        assert!(registry.get(QUERY).is_some());
    }

    #[test]
    fn test_register_replaces_without_duplicating() {
        let mut registry = registry();
        registry.register(Arc::new(ListTablesTool::new(Arc::new(StubDatabase))));
        assert_eq!(registry.list_tools().len(), 4);
    }

    #[test]
    fn test_tools_description() {
        let description = registry().tools_description();

        assert!(description.contains("Tool: sql_db_query\n"));
        assert!(description.contains("query (string): The SQL query to run [required]"));
        assert!(description.contains("(none)"));
    }
}
