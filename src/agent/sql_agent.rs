//! SQL Agent - ReAct (Reason + Act) loop over the inventory database
//!
//! Information Hiding:
//! - Prompt format and decision parsing hidden
//! - Tool selection and observation feedback internalized
//! - Progress reported only through the event sink

use super::events::{AgentEvent, AgentEventSink};
use crate::config::AgentConfig;
use crate::core::llm::{ChatMessage, ChatModel};
use crate::database::SqlDatabase;
use crate::tools::{executor::ToolExecutor, registry::ToolRegistry, ToolConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Answer given when the loop runs out of iterations
pub const STOPPED_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

/// Decision structure returned by LLM
#[derive(Debug, Deserialize, Serialize)]
struct AgentDecision {
    #[serde(default)]
    thought: String,
    #[serde(default)]
    action: Option<AgentAction>,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    final_answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AgentAction {
    tool: String,
    #[serde(default)]
    input: Value,
}

/// Agent bound to one database handle
pub struct SqlAgent {
    llm: Arc<dyn ChatModel>,
    db: Arc<dyn SqlDatabase>,
    tool_registry: ToolRegistry,
    tool_executor: ToolExecutor,
    config: AgentConfig,
}

impl SqlAgent {
    pub fn new(db: Arc<dyn SqlDatabase>, llm: Arc<dyn ChatModel>, config: AgentConfig) -> Self {
        let tool_registry = ToolRegistry::for_database(db.clone(), llm.clone(), config.max_rows);

        Self {
            llm,
            db,
            tool_registry,
            tool_executor: ToolExecutor::new(ToolConfig::default()),
            config,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an agent designed to interact with a SQL database.\n\
             Given an input question, create a syntactically correct {dialect} query to run, \
             then look at the results of the query and return the answer.\n\
             Unless the user specifies a specific number of examples they wish to obtain, \
             always limit your query to at most {top_k} results.\n\
             You can order the results by a relevant column to return the most interesting examples.\n\
             Never query for all the columns from a specific table, only ask for the relevant columns.\n\
             Only use the tools below and only the information they return to construct your final answer.\n\
             You MUST double check your query with {checker} before executing it. \
             If you get an error while executing a query, rewrite the query and try again.\n\
             DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.\n\
             If the question does not seem related to the database, just return \"I don't know\" as the answer.\n\
             Start by listing the tables, then look at the schema of the relevant tables.\n\n\
             Available Tools:\n{tools}\n\n\
             IMPORTANT: You MUST respond in this EXACT JSON format:\n\
             {{\n  \
               \"thought\": \"your reasoning about what to do next\",\n  \
               \"action\": {{\"tool\": \"tool_name\", \"input\": {{\"param\": \"value\"}}}},\n  \
               \"is_final\": false,\n  \
               \"final_answer\": null\n\
             }}\n\n\
             When you know the answer:\n\
             - Set \"is_final\": true\n\
             - Set \"action\": null\n\
             - Put the answer to the original question in \"final_answer\"\n\n\
             Always respond with valid JSON only. No extra text.",
            dialect = self.db.dialect(),
            top_k = self.config.top_k,
            checker = crate::tools::sql::QUERY_CHECKER,
            tools = self.tool_registry.tools_description()
        )
    }

    /// Answer one question, streaming every step into `sink`
    ///
    /// Model failures abort the run; tool failures are fed back as observations.
    pub async fn run(&self, question: &str, sink: &dyn AgentEventSink) -> Result<String> {
        let mut conversation = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(format!("Question: {}", question)),
        ];

        for iteration in 0..self.config.max_iterations {
            tracing::debug!(
                "Agent iteration {}/{}",
                iteration + 1,
                self.config.max_iterations
            );

            // Think: Ask LLM for next action
            let decision = self.think(&conversation).await?;

            if !decision.thought.is_empty() {
                sink.on_event(&AgentEvent::Thought {
                    text: decision.thought.clone(),
                });
            }

            if decision.is_final {
                let answer = decision
                    .final_answer
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| decision.thought.clone());
                return Ok(self.finish(answer, sink));
            }

            let Some(action) = decision.action else {
                // No action and not final: the model answered in prose
                if !decision.thought.is_empty() {
                    tracing::info!("No action requested, treating thought as the answer");
                    return Ok(self.finish(decision.thought, sink));
                }

                conversation.push(ChatMessage::user(
                    "Your reply contained neither an action nor a final answer. \
                     Respond with the required JSON.",
                ));
                continue;
            };

            // Act: Execute the tool
            sink.on_event(&AgentEvent::ToolStart {
                tool: action.tool.clone(),
                input: action.input.clone(),
            });

            let observation = match self.tool_registry.get(&action.tool) {
                Some(tool) => {
                    let result = self.tool_executor.execute(tool, action.input.clone()).await?;
                    if result.success {
                        sink.on_event(&AgentEvent::ToolEnd {
                            tool: action.tool.clone(),
                            output: result.output.clone(),
                        });
                        result.output
                    } else {
                        let error = result.error.unwrap_or_default();
                        sink.on_event(&AgentEvent::ToolError {
                            tool: action.tool.clone(),
                            error: error.clone(),
                        });
                        error
                    }
                }
                None => {
                    let error = format!(
                        "{} is not a valid tool, try one of [{}].",
                        action.tool,
                        self.tool_registry.tool_names().join(", ")
                    );
                    sink.on_event(&AgentEvent::ToolError {
                        tool: action.tool.clone(),
                        error: error.clone(),
                    });
                    error
                }
            };

            tracing::debug!("Tool observation: {}", observation);

            // Observe: feed the result back
            conversation.push(ChatMessage::assistant(
                serde_json::to_string(&AgentDecision {
                    thought: decision.thought,
                    action: Some(action.clone()),
                    is_final: false,
                    final_answer: None,
                })
                .unwrap_or_else(|_| format!("Action: {}", action.tool)),
            ));
            conversation.push(ChatMessage::user(format!(
                "Observation: {}\n\nDoes this observation answer the original question? \
                 If yes, set is_final=true and provide final_answer. \
                 If no, what is the next action needed?",
                observation
            )));
        }

        tracing::warn!(
            "Agent hit the iteration limit ({})",
            self.config.max_iterations
        );
        Ok(self.finish(STOPPED_ANSWER.to_string(), sink))
    }

    fn finish(&self, answer: String, sink: &dyn AgentEventSink) -> String {
        sink.on_event(&AgentEvent::Finish {
            answer: answer.clone(),
        });
        answer
    }

    /// Think step - Ask LLM to reason about next action
    async fn think(&self, conversation: &[ChatMessage]) -> Result<AgentDecision> {
        let response = self.llm.chat(conversation.to_vec()).await?;
        Ok(parse_decision(&response))
    }
}

fn parse_decision(response: &str) -> AgentDecision {
    if let Ok(decision) = serde_json::from_str::<AgentDecision>(response) {
        return decision;
    }

    // Try to find JSON in the response
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            if let Ok(decision) = serde_json::from_str::<AgentDecision>(&response[start..=end]) {
                return decision;
            }
        }
    }

    tracing::info!("Treating non-JSON model output as the final answer");
    AgentDecision {
        thought: String::new(),
        action: None,
        is_final: true,
        final_answer: Some(response.trim().to_string()),
    }
}
