//! Agent runner with tool calling loop.

use super::stream::ToolCallAccumulator;
use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::config::{Prompts, ToolChoiceSetting};
use crate::error::{DocentError, Result};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ModelDelta, ToolChoice, ToolInvocation};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Progress reported while the agent runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A piece of answer text.
    Token(String),
    /// A tool is about to run.
    ToolStarted { name: String, arguments: String },
    /// A tool returned.
    ToolFinished { name: String, result: String },
}

impl From<ToolChoiceSetting> for ToolChoice {
    fn from(setting: ToolChoiceSetting) -> Self {
        match setting {
            ToolChoiceSetting::Required => ToolChoice::Required,
            ToolChoiceSetting::Auto => ToolChoice::Auto,
        }
    }
}

/// Agent that answers through the document tool.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: ToolContext,
    prompts: Prompts,
    max_iterations: usize,
    tool_choice: ToolChoice,
}

impl Agent {
    /// Create a new agent with the given model and tool context.
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolContext) -> Self {
        Self {
            model,
            tools,
            prompts: Prompts::default(),
            max_iterations: 15,
            tool_choice: ToolChoice::Required,
        }
    }

    /// Set custom prompts.
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Tool policy for the first model call of each run.
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Run one user turn on top of the prior transcript.
    ///
    /// Answer tokens and tool activity are sent on `events` as they happen.
    /// Closing the receiving side stops the run with [`DocentError::Cancelled`].
    pub async fn run(
        &self,
        history: &[ChatMessage],
        input: &str,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<AgentResponse> {
        let system = self
            .prompts
            .render_with_custom(&self.prompts.agent.system, &HashMap::new());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(self.prompts.render_human(input)));

        let tools = tool_definitions(&self.prompts);
        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(DocentError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }
            if events.is_closed() {
                return Err(DocentError::Cancelled);
            }

            let tool_choice = if iterations == 1 {
                self.tool_choice
            } else {
                ToolChoice::Auto
            };
            debug!(
                "Agent iteration {} on {} ({:?})",
                iterations,
                self.model.model_name(),
                tool_choice
            );

            let request =
                ChatRequest::new(messages.clone()).with_tools(tools.clone(), tool_choice);
            let mut stream = self.model.stream(request).await?;

            let mut content = String::new();
            let mut pending = ToolCallAccumulator::new();

            while let Some(delta) = stream.next().await {
                match delta? {
                    ModelDelta::Content(text) => {
                        if text.is_empty() {
                            continue;
                        }
                        content.push_str(&text);
                        emit(events, AgentEvent::Token(text)).await?;
                    }
                    ModelDelta::ToolCall {
                        index,
                        id,
                        name,
                        arguments,
                    } => pending.push(index, id, name, arguments),
                }
            }

            if pending.is_empty() {
                return Ok(AgentResponse {
                    output: content,
                    tool_calls: tool_calls_made,
                    iterations,
                });
            }

            let calls = pending.finish();
            messages.push(ChatMessage::Assistant {
                content: (!content.is_empty()).then_some(content),
                tool_calls: calls.clone(),
            });

            for call in &calls {
                emit(
                    events,
                    AgentEvent::ToolStarted {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                )
                .await?;

                let record = self.execute_tool_call(call).await;

                emit(
                    events,
                    AgentEvent::ToolFinished {
                        name: record.name.clone(),
                        result: record.result.clone(),
                    },
                )
                .await?;

                messages.push(ChatMessage::tool(&call.id, &record.result));
                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, call: &ToolInvocation) -> ToolCallRecord {
        info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

        let result = match parse_tool_call(&call.name, &call.arguments) {
            Ok(tool) => match self.tools.execute(&tool).await {
                Ok(output) => output,
                Err(e) => format!("Tool error: {}", e),
            },
            Err(e) => format!("Tool error: {}", e),
        };

        ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        }
    }
}

async fn emit(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<()> {
    events.send(event).await.map_err(|_| DocentError::Cancelled)
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer text.
    pub output: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::tests::KeywordEmbedder;
    use crate::llm::testing::{text, tool_call, ScriptedModel};
    use crate::rag::RagEngine;
    use crate::vector_store::{stored, MemoryVectorStore, VectorStore};

    async fn rag(answer: &str) -> (Arc<RagEngine>, Arc<ScriptedModel>) {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert_batch(&[stored(
                "refunds.txt",
                0,
                "Refunds take 30 days.",
                vec![1.0, 0.0, 0.0, 0.0],
            )])
            .await
            .unwrap();
        let model = Arc::new(ScriptedModel::answering(answer));
        let engine = RagEngine::new(
            store,
            Arc::new(KeywordEmbedder::default()),
            model.clone(),
            2,
        );
        (Arc::new(engine), model)
    }

    fn drain(rx: &mut mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_direct_answer_streams_tokens() {
        let (rag, _) = rag("unused").await;
        let model = Arc::new(ScriptedModel::new(vec![text("你好！有什麼可以幫忙的嗎？")]));
        let agent = Agent::new(model.clone(), ToolContext::new(rag))
            .with_tool_choice(ToolChoice::Auto);

        let (tx, mut rx) = mpsc::channel(64);
        let response = agent.run(&[], "哈囉", &tx).await.unwrap();

        assert_eq!(response.output, "你好！有什麼可以幫忙的嗎？");
        assert_eq!(response.iterations, 1);
        assert!(response.tool_calls.is_empty());

        let tokens: String = drain(&mut rx)
            .into_iter()
            .map(|event| match event {
                AgentEvent::Token(t) => t,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(tokens, response.output);
        assert_eq!(model.requests()[0].tool_choice, ToolChoice::Auto);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let (rag, rag_model) = rag("Thirty days.").await;
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("call_1", "rag_answer", r#"{"message": " refund\npolicy? "}"#),
            text("退款需要三十天。"),
        ]));
        let agent = Agent::new(model.clone(), ToolContext::new(rag));

        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];
        let (tx, mut rx) = mpsc::channel(64);
        let response = agent.run(&history, "退款政策?", &tx).await.unwrap();

        assert_eq!(response.output, "退款需要三十天。");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].result, "Thirty days.");

        let requests = model.requests();
        assert_eq!(requests[0].tool_choice, ToolChoice::Required);
        assert_eq!(requests[1].tool_choice, ToolChoice::Auto);
        assert_eq!(requests[0].tools[0].name, "rag_answer");

        let first = &requests[0].messages;
        assert_eq!(first.len(), 4);
        assert!(matches!(first[0], ChatMessage::System { .. }));
        assert_eq!(first[1], ChatMessage::user("earlier"));
        assert_eq!(first[2], ChatMessage::assistant("reply"));
        assert_eq!(
            first[3],
            ChatMessage::user(Prompts::default().render_human("退款政策?"))
        );

        let second = &requests[1].messages;
        assert_eq!(second.len(), 6);
        assert_eq!(second[5], ChatMessage::tool("call_1", "Thirty days."));

        let rag_prompt = rag_model.requests()[0].messages[1]
            .content()
            .unwrap()
            .to_string();
        assert!(rag_prompt.contains("Query: refundpolicy?"));

        let events = drain(&mut rx);
        assert!(matches!(events[0], AgentEvent::ToolStarted { ref name, .. } if name == "rag_answer"));
        assert!(matches!(events[1], AgentEvent::ToolFinished { ref result, .. } if result == "Thirty days."));
        assert!(matches!(events[2], AgentEvent::Token(_)));
    }

    #[tokio::test]
    async fn test_tool_failure_is_reported_to_model() {
        let (rag, _) = rag("unused").await;
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("call_1", "search", r#"{"message": "x"}"#),
            text("Sorry."),
        ]));
        let agent = Agent::new(model.clone(), ToolContext::new(rag));

        let (tx, _rx) = mpsc::channel(64);
        let response = agent.run(&[], "x", &tx).await.unwrap();

        assert_eq!(response.output, "Sorry.");
        assert!(response.tool_calls[0].result.starts_with("Tool error:"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let (rag, _) = rag("again").await;
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("call_1", "rag_answer", r#"{"message": "a"}"#),
            tool_call("call_2", "rag_answer", r#"{"message": "b"}"#),
            tool_call("call_3", "rag_answer", r#"{"message": "c"}"#),
        ]));
        let agent = Agent::new(model, ToolContext::new(rag)).with_max_iterations(2);

        let (tx, _rx) = mpsc::channel(64);
        let err = agent.run(&[], "loop", &tx).await.unwrap_err();
        assert!(matches!(err, DocentError::Agent(_)));
    }

    #[tokio::test]
    async fn test_closed_receiver_cancels() {
        let (rag, _) = rag("unused").await;
        let model = Arc::new(ScriptedModel::new(vec![text("never")]));
        let agent = Agent::new(model.clone(), ToolContext::new(rag));

        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let err = agent.run(&[], "hi", &tx).await.unwrap_err();
        assert!(matches!(err, DocentError::Cancelled));
        assert!(model.requests().is_empty());
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "rag_answer".to_string(),
            arguments: r#"{"message": "test"}"#.to_string(),
            result: "Found results".to_string(),
        };
        assert_eq!(format!("{}", record), r#"rag_answer({"message": "test"})"#);
    }
}
