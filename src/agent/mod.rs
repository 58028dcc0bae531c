//! Tool-calling agent.
//!
//! Wraps the RAG engine as a single `rag_answer` tool and lets the chat model
//! decide when to consult the documents, streaming the answer as it goes.

mod runner;
mod stream;
mod tools;

pub use runner::{Agent, AgentEvent, AgentResponse, ToolCallRecord};
pub use stream::ToolCallAccumulator;
pub use tools::{parse_tool_call, sanitize_message, tool_definitions, ToolCall, ToolContext, RAG_ANSWER};
