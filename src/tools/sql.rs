//! SQL Tools
//!
//! Information Hiding:
//! - Each tool wraps the shared database handle
//! - Query errors returned as failed results so the agent can rewrite its query
//! - The checker's prompt kept private to this module

use super::{string_arg, Tool, ToolMetadata, ToolParameter, ToolResult};
use crate::core::llm::{ChatMessage, ChatModel};
use crate::database::SqlDatabase;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const LIST_TABLES: &str = "sql_db_list_tables";
pub const SCHEMA: &str = "sql_db_schema";
pub const QUERY: &str = "sql_db_query";
pub const QUERY_CHECKER: &str = "sql_db_query_checker";

fn parameter(name: &str, description: &str) -> ToolParameter {
    ToolParameter {
        name: name.to_string(),
        param_type: "string".to_string(),
        description: description.to_string(),
        required: true,
    }
}

/// Lists the tables the handle exposes
pub struct ListTablesTool {
    db: Arc<dyn SqlDatabase>,
}

impl ListTablesTool {
    pub fn new(db: Arc<dyn SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: LIST_TABLES.to_string(),
            description: "Returns a comma-separated list of tables in the database. Input is ignored."
                .to_string(),
            parameters: vec![],
        }
    }

    async fn execute(&self, _args: Value) -> Result<ToolResult> {
        Ok(ToolResult::success(self.db.usable_tables().join(", ")))
    }
}

/// Schema and sample rows for the requested tables
pub struct SchemaTool {
    db: Arc<dyn SqlDatabase>,
}

impl SchemaTool {
    pub fn new(db: Arc<dyn SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for SchemaTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: SCHEMA.to_string(),
            description: format!(
                "Returns the schema and sample rows for the given tables. \
                 Be sure the tables exist by calling {} first.",
                LIST_TABLES
            ),
            parameters: vec![parameter("tables", "Comma-separated list of table names")],
        }
    }

    fn validate(&self, args: &Value) -> Result<()> {
        string_arg(args, "tables").map(|_| ())
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let tables: Vec<String> = string_arg(&args, "tables")?
            .split(',')
            .map(|t| t.trim().to_string())
            .collect();

        match self.db.table_info(&tables).await {
            Ok(info) => Ok(ToolResult::success(info)),
            Err(e) => Ok(ToolResult::failure(format!("Error: {:#}", e))),
        }
    }
}

/// Runs a query and returns its rows
pub struct QueryTool {
    db: Arc<dyn SqlDatabase>,
    max_rows: usize,
}

impl QueryTool {
    pub fn new(db: Arc<dyn SqlDatabase>, max_rows: usize) -> Self {
        Self { db, max_rows }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: QUERY.to_string(),
            description: format!(
                "Executes a detailed and correct SQL query and returns the result. \
                 If the query is not correct an error message is returned; rewrite the query, \
                 check it, and try again. If you get an unknown column error, use {} to see \
                 the correct table fields.",
                SCHEMA
            ),
            parameters: vec![parameter("query", "The SQL query to run")],
        }
    }

    fn validate(&self, args: &Value) -> Result<()> {
        string_arg(args, "query").map(|_| ())
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let query = string_arg(&args, "query")?;
        tracing::info!("Agent query: {}", query);

        match self.db.run(&query, self.max_rows).await {
            Ok(output) => Ok(ToolResult::success(output.to_string())),
            Err(e) => Ok(ToolResult::failure(format!("Error: {:#}", e))),
        }
    }
}

/// Asks the model to double-check a query before it is run
pub struct QueryCheckerTool {
    db: Arc<dyn SqlDatabase>,
    model: Arc<dyn ChatModel>,
}

impl QueryCheckerTool {
    pub fn new(db: Arc<dyn SqlDatabase>, model: Arc<dyn ChatModel>) -> Self {
        Self { db, model }
    }

    fn prompt(&self, query: &str) -> String {
        format!(
            "{query}\n\
             Double check the {dialect} query above for common mistakes, including:\n\
             - Using NOT IN with NULL values\n\
             - Using UNION when UNION ALL should have been used\n\
             - Using BETWEEN for exclusive ranges\n\
             - Data type mismatch in predicates\n\
             - Properly quoting identifiers\n\
             - Using the correct number of arguments for functions\n\
             - Casting to the correct data type\n\
             - Using the proper columns for joins\n\n\
             If there are any of the above mistakes, rewrite the query. \
             If there are no mistakes, just reproduce the original query.\n\n\
             Output the final SQL query only.",
            query = query,
            dialect = self.db.dialect()
        )
    }
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: QUERY_CHECKER.to_string(),
            description: format!(
                "Double checks whether a query is correct before executing it. \
                 Always use this tool before executing a query with {}.",
                QUERY
            ),
            parameters: vec![parameter("query", "The SQL query to check")],
        }
    }

    fn validate(&self, args: &Value) -> Result<()> {
        string_arg(args, "query").map(|_| ())
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let query = string_arg(&args, "query")?;
        let checked = self
            .model
            .chat(vec![ChatMessage::user(self.prompt(&query))])
            .await?;
        Ok(ToolResult::success(strip_code_fence(&checked)))
    }
}

/// Models like to wrap SQL in ```sql fences
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = match inner.split_once('\n') {
        Some((lang, rest)) if !lang.trim().contains(' ') => rest,
        _ => inner,
    };
    inner.trim().to_string()
}
