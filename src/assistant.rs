//! The chat assistant: wires the index, RAG engine, agent and sessions together
//! and turns an agent run into a stream of UI updates.

use crate::agent::{Agent, AgentEvent, ToolContext};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{DocentError, Result};
use crate::indexer::{IndexReport, Indexer};
use crate::llm::OpenAIChatModel;
use crate::openai::create_client_with_timeout;
use crate::rag::RagEngine;
use crate::session::{SessionStore, DEFAULT_SESSION};
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

const UPDATE_BUFFER: usize = 64;

/// What the chat UI should show next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum ChatUpdate {
    /// Reply to an empty message.
    Greeting(String),
    /// Placeholder until the first token arrives.
    Thinking(String),
    /// Answer so far.
    Partial(String),
    /// The complete answer.
    Done(String),
    Error(String),
}

impl ChatUpdate {
    /// Event name used on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatUpdate::Greeting(_) => "greeting",
            ChatUpdate::Thinking(_) => "thinking",
            ChatUpdate::Partial(_) => "partial",
            ChatUpdate::Done(_) => "done",
            ChatUpdate::Error(_) => "error",
        }
    }
}

/// Chat assistant shared by the web server and the terminal commands.
#[derive(Clone)]
pub struct Assistant {
    agent: Arc<Agent>,
    sessions: SessionStore,
    prompts: Arc<Prompts>,
    index_report: Option<IndexReport>,
}

impl Assistant {
    pub fn new(agent: Agent, sessions: SessionStore, prompts: Prompts) -> Self {
        Self {
            agent: Arc::new(agent),
            sessions,
            prompts: Arc::new(prompts),
            index_report: None,
        }
    }

    /// Build every component from settings and bring the index up to date.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let timeout = Duration::from_secs(settings.llm.request_timeout_secs);

        let embedder = build_embedder(settings)?;
        let vector_store = build_vector_store(settings)?;

        let indexer = Indexer::from_settings(settings, embedder.clone(), vector_store.clone())?;
        let report = indexer.build().await?;

        let openai_client = create_client_with_timeout(
            &settings.openai_api_key()?,
            settings.openai.api_base.as_deref(),
            timeout,
        )?;
        let rag_model = OpenAIChatModel::new(openai_client, &settings.rag_model())
            .with_temperature(settings.rag.temperature);
        let rag = RagEngine::new(
            vector_store,
            embedder,
            Arc::new(rag_model),
            settings.rag.similarity_top_k,
        )
        .with_min_score(settings.rag.min_score)
        .with_prompts(prompts.clone());

        let provider = settings.chat_provider()?;
        info!("Agent model: {} ({})", provider.model, provider.provider);
        let chat_model = OpenAIChatModel::from_provider(&provider, timeout)?
            .with_temperature(settings.llm.temperature)
            .with_max_tokens(settings.llm.max_tokens);

        let agent = Agent::new(Arc::new(chat_model), ToolContext::new(Arc::new(rag)))
            .with_prompts(prompts.clone())
            .with_max_iterations(settings.llm.max_iterations)
            .with_tool_choice(settings.llm.tool_choice.into());

        let mut assistant = Self::new(
            agent,
            SessionStore::new(settings.session.max_messages),
            prompts,
        );
        assistant.index_report = Some(report);
        Ok(assistant)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Outcome of the index build done at startup, if any.
    pub fn index_report(&self) -> Option<&IndexReport> {
        self.index_report.as_ref()
    }

    /// Answer a message, streaming UI updates.
    ///
    /// Dropping the returned stream cancels the run; nothing is recorded then.
    pub fn chat(&self, session_id: Option<&str>, message: &str) -> ReceiverStream<ChatUpdate> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_SESSION)
            .to_string();
        info!(session = %session_id, "Chat input: {}", message);

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);

        if message.trim().is_empty() {
            let greeting = ChatUpdate::Greeting(self.prompts.chat.greeting.clone());
            if tx.try_send(greeting).is_err() {
                debug!("Greeting dropped");
            }
            return ReceiverStream::new(rx);
        }

        let assistant = self.clone();
        let message = message.to_string();
        tokio::spawn(async move { assistant.run_turn(session_id, message, tx).await });

        ReceiverStream::new(rx)
    }

    async fn run_turn(self, session_id: String, message: String, updates: mpsc::Sender<ChatUpdate>) {
        let thinking = ChatUpdate::Thinking(self.prompts.chat.thinking.clone());
        if updates.send(thinking).await.is_err() {
            return;
        }

        let history = match self.sessions.history(&session_id) {
            Ok(history) => history,
            Err(e) => {
                let _ = updates.send(ChatUpdate::Error(e.to_string())).await;
                return;
            }
        };

        let (events_tx, events_rx) = mpsc::channel(UPDATE_BUFFER);
        let agent = &self.agent;
        let input = message.as_str();
        let updates_ref = &updates;

        let run = async move {
            // Racing the client means a stop also aborts a pending tool call
            let result = tokio::select! {
                result = agent.run(&history, input, &events_tx) => result,
                _ = updates_ref.closed() => Err(DocentError::Cancelled),
            };
            drop(events_tx);
            result
        };

        // Resolves to whether every partial update reached the client
        let forward = async move {
            let mut events_rx = events_rx;
            let mut partial = String::new();
            while let Some(event) = events_rx.recv().await {
                match event {
                    AgentEvent::Token(token) => {
                        partial.push_str(&token);
                        if updates_ref
                            .send(ChatUpdate::Partial(partial.clone()))
                            .await
                            .is_err()
                        {
                            return false;
                        }
                    }
                    AgentEvent::ToolStarted { name, arguments } => {
                        debug!("Tool {} started: {}", name, arguments);
                        partial.clear();
                    }
                    AgentEvent::ToolFinished { name, result } => {
                        debug!("Tool {} returned {} chars", name, result.chars().count());
                    }
                }
            }
            true
        };

        let (result, delivered) = tokio::join!(run, forward);
        let result = match result {
            Ok(_) if !delivered || updates.is_closed() => Err(DocentError::Cancelled),
            other => other,
        };

        match result {
            Ok(response) => {
                if let Err(e) = self
                    .sessions
                    .append_turn(&session_id, &message, &response.output)
                {
                    let _ = updates.send(ChatUpdate::Error(e.to_string())).await;
                    return;
                }
                info!(
                    session = %session_id,
                    iterations = response.iterations,
                    "Chat response: {}",
                    response.output
                );
                let _ = updates.send(ChatUpdate::Done(response.output)).await;
            }
            Err(DocentError::Cancelled) => {
                info!(session = %session_id, "Chat cancelled, nothing recorded");
            }
            Err(e) => {
                error!(session = %session_id, "Chat failed: {}", e);
                let _ = updates.send(ChatUpdate::Error(e.to_string())).await;
            }
        }
    }
}

/// OpenAI embedder configured from the `[embedding]` settings.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let client = create_client_with_timeout(
        &settings.openai_api_key()?,
        settings.openai.api_base.as_deref(),
        Duration::from_secs(settings.llm.request_timeout_secs),
    )?;
    Ok(Arc::new(OpenAIEmbedder::with_config(
        client,
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    )))
}

/// The persistent SQLite store when caching is on, otherwise an in-memory one.
pub fn build_vector_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    if settings.index.cache {
        Ok(Arc::new(SqliteVectorStore::new(&settings.cache_path())?))
    } else {
        Ok(Arc::new(MemoryVectorStore::new()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indexer::tests::KeywordEmbedder;
    use crate::llm::testing::{self, ScriptedModel};
    use crate::llm::{ChatMessage, ChatModel, ChatRequest, DeltaStream, ModelDelta, ToolChoice};
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Notify;

    /// Streams one token, then holds the rest of the answer until released.
    struct HeldModel {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl ChatModel for HeldModel {
        async fn complete(&self, _request: ChatRequest) -> Result<String> {
            Ok(String::new())
        }

        async fn stream(&self, _request: ChatRequest) -> Result<DeltaStream> {
            let release = self.release.clone();
            let first = futures::stream::iter(vec![Ok::<_, DocentError>(ModelDelta::Content(
                "Refunds ".to_string(),
            ))]);
            let rest = futures::stream::once(async move {
                release.notified().await;
                Ok::<_, DocentError>(ModelDelta::Content("take 5 days.".to_string()))
            });
            Ok(first.chain(rest).boxed())
        }

        fn model_name(&self) -> &str {
            "held"
        }
    }

    pub(crate) fn assistant(model: Arc<dyn ChatModel>) -> Assistant {
        let rag = RagEngine::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(KeywordEmbedder::default()),
            Arc::new(ScriptedModel::answering("unused")),
            2,
        );
        let agent = Agent::new(model, ToolContext::new(Arc::new(rag)))
            .with_tool_choice(ToolChoice::Auto);
        Assistant::new(agent, SessionStore::new(50), Prompts::default())
    }

    #[tokio::test]
    async fn test_blank_message_greets() {
        let model = Arc::new(ScriptedModel::answering("unused"));
        let assistant = assistant(model.clone());

        let updates: Vec<ChatUpdate> = assistant.chat(None, "  \n ").collect().await;
        assert_eq!(
            updates,
            vec![ChatUpdate::Greeting("哈囉，請問您想問些什麼呢?".to_string())]
        );
        assert!(assistant.sessions().is_empty());
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_streams_cumulative_answer() {
        let model = Arc::new(ScriptedModel::new(vec![vec![
            ModelDelta::Content("Hello ".to_string()),
            ModelDelta::Content("there".to_string()),
        ]]));
        let assistant = assistant(model);

        let updates: Vec<ChatUpdate> = assistant.chat(None, "hi").collect().await;
        assert_eq!(
            updates,
            vec![
                ChatUpdate::Thinking("(思考中...)".to_string()),
                ChatUpdate::Partial("Hello ".to_string()),
                ChatUpdate::Partial("Hello there".to_string()),
                ChatUpdate::Done("Hello there".to_string()),
            ]
        );

        let history = assistant.sessions().history(DEFAULT_SESSION).unwrap();
        assert_eq!(
            history,
            vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello there")]
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let model = Arc::new(ScriptedModel::answering("ok"));
        let assistant = assistant(model.clone());

        let _: Vec<_> = assistant.chat(Some("a"), "first").collect().await;
        let _: Vec<_> = assistant.chat(Some("b"), "second").collect().await;
        let _: Vec<_> = assistant.chat(Some("a"), "third").collect().await;

        let requests = model.requests();
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages.len(), 2);
        // system + first turn + new input
        assert_eq!(requests[2].messages.len(), 4);
        assert_eq!(requests[2].messages[1], ChatMessage::user("first"));
    }

    #[tokio::test]
    async fn test_error_is_reported_and_not_recorded() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let assistant = assistant(model);

        let updates: Vec<ChatUpdate> = assistant.chat(Some("s"), "hi").collect().await;
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[0], ChatUpdate::Thinking(_)));
        assert!(matches!(updates[1], ChatUpdate::Error(_)));
        assert!(assistant.sessions().history("s").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_restarts_after_tool_call() {
        let mut first = vec![ModelDelta::Content("Let me check. ".to_string())];
        first.extend(testing::tool_call("call_1", "rag_answer", r#"{"message": "refund"}"#));
        let model = Arc::new(ScriptedModel::new(vec![
            first,
            testing::text("Refunds take 5 days."),
        ]));
        let assistant = assistant(model);

        let updates: Vec<ChatUpdate> = assistant.chat(Some("s"), "refund?").collect().await;
        assert_eq!(
            updates,
            vec![
                ChatUpdate::Thinking("(思考中...)".to_string()),
                ChatUpdate::Partial("Let me check. ".to_string()),
                ChatUpdate::Partial("Refunds ".to_string()),
                ChatUpdate::Partial("Refunds take ".to_string()),
                ChatUpdate::Partial("Refunds take 5 ".to_string()),
                ChatUpdate::Partial("Refunds take 5 days.".to_string()),
                ChatUpdate::Done("Refunds take 5 days.".to_string()),
            ]
        );
        assert_eq!(
            assistant.sessions().history("s").unwrap()[1],
            ChatMessage::assistant("Refunds take 5 days.")
        );
    }

    #[tokio::test]
    async fn test_dropped_stream_records_nothing() {
        let release = Arc::new(Notify::new());
        let assistant = assistant(Arc::new(HeldModel {
            release: release.clone(),
        }));

        let mut updates = assistant.chat(Some("s"), "refund?");
        assert!(matches!(updates.next().await, Some(ChatUpdate::Thinking(_))));
        assert_eq!(
            updates.next().await,
            Some(ChatUpdate::Partial("Refunds ".to_string()))
        );
        drop(updates);
        release.notify_one();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(assistant.sessions().history("s").unwrap().is_empty());
    }

    #[test]
    fn test_update_serialization() {
        let json = serde_json::to_value(ChatUpdate::Partial("Hel".to_string())).unwrap();
        assert_eq!(json["type"], "partial");
        assert_eq!(json["text"], "Hel");
        assert_eq!(ChatUpdate::Done(String::new()).event_name(), "done");
    }
}
