//! Tool definitions and implementations for the agent system.

use crate::config::Prompts;
use crate::error::{DocentError, Result};
use crate::llm::ToolSpec;
use crate::rag::context::describe_sources;
use crate::rag::RagEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Name under which the document tool is offered to the model.
pub const RAG_ANSWER: &str = "rag_answer";

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Answer a question from the indexed documents.
    RagAnswer { message: String },
}

/// Tool execution context.
pub struct ToolContext {
    pub rag: Arc<RagEngine>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(rag: Arc<RagEngine>) -> Self {
        Self { rag }
    }

    /// Execute a tool call and return the result as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        match tool {
            ToolCall::RagAnswer { message } => self.execute_rag_answer(message).await,
        }
    }

    async fn execute_rag_answer(&self, message: &str) -> Result<String> {
        let question = sanitize_message(message);
        debug!("Forwarding to RAG engine: {}", question);
        let response = self.rag.ask(&question).await?;
        if response.sources.is_empty() {
            info!("No indexed text matched: {}", question);
        } else {
            info!("Answered from {}", describe_sources(&response.sources));
        }
        Ok(response.answer)
    }
}

/// Trim the model-supplied question and drop embedded newlines.
pub fn sanitize_message(message: &str) -> String {
    message.trim().replace('\n', "")
}

/// Tool definitions offered to the model.
pub fn tool_definitions(prompts: &Prompts) -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: RAG_ANSWER.to_string(),
        description: prompts.agent.tool_description.clone(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The user's question"
                }
            },
            "required": ["message"]
        }),
    }]
}

/// Parse a tool call from the model's function name and JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| DocentError::Agent(format!("Invalid tool arguments: {}", e)))?;

    match name {
        RAG_ANSWER => {
            let message = args["message"]
                .as_str()
                .ok_or_else(|| DocentError::Agent("Missing 'message' argument".to_string()))?
                .to_string();
            Ok(ToolCall::RagAnswer { message })
        }
        _ => Err(DocentError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rag_answer() {
        let tool = parse_tool_call("rag_answer", r#"{"message": "What is RAG?"}"#).unwrap();
        assert_eq!(
            tool,
            ToolCall::RagAnswer {
                message: "What is RAG?".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_calls() {
        assert!(parse_tool_call("search", r#"{"message": "x"}"#).is_err());
        assert!(parse_tool_call("rag_answer", r#"{"query": "x"}"#).is_err());
        assert!(parse_tool_call("rag_answer", "not json").is_err());
    }

    #[test]
    fn test_sanitize_message() {
        assert_eq!(sanitize_message("  what\nis this?\n "), "whatis this?");
        assert_eq!(sanitize_message("\n"), "");
    }

    #[test]
    fn test_tool_definitions_use_prompt_description() {
        let mut prompts = Prompts::default();
        prompts.agent.tool_description = "Ask the docs".to_string();

        let tools = tool_definitions(&prompts);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "rag_answer");
        assert_eq!(tools[0].description, "Ask the docs");
        assert_eq!(tools[0].parameters["required"][0], "message");
    }
}
