//! Chat model abstraction.
//!
//! The agent and the RAG engine talk to hosted models through the
//! [`ChatModel`] trait so that the provider (OpenAI, Groq) is a configuration
//! detail and tests can script model behaviour.

mod openai;
#[cfg(test)]
pub(crate) mod testing;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// A message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    /// A plain assistant reply without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage::Tool {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    /// Text content of the message, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ChatMessage::System { content }
            | ChatMessage::User { content }
            | ChatMessage::Tool { content, .. } => Some(content),
            ChatMessage::Assistant { content, .. } => content.as_deref(),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
}

/// A single chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: ToolChoice,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>, tool_choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = tool_choice;
        self
    }
}

/// One fragment of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    /// Answer text.
    Content(String),
    /// Part of a tool call. Fragments sharing an `index` belong to one call.
    ToolCall {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
}

/// Stream of completion fragments.
pub type DeltaStream = BoxStream<'static, Result<ModelDelta>>;

/// A hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a request to completion and return the answer text.
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Run a request and stream the answer as it is generated.
    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream>;

    /// Name of the underlying model.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_with_role_tag() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");

        let json = serde_json::to_value(ChatMessage::assistant("hello")).unwrap();
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_message_content() {
        assert_eq!(ChatMessage::tool("call_1", "done").content(), Some("done"));
        let call = ChatMessage::Assistant {
            content: None,
            tool_calls: vec![ToolInvocation {
                id: "call_1".to_string(),
                name: "rag_answer".to_string(),
                arguments: "{}".to_string(),
            }],
        };
        assert_eq!(call.content(), None);
    }
}
