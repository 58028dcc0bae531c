//! OpenAI-compatible chat model implementation.

use super::{ChatMessage, ChatModel, ChatRequest, DeltaStream, ModelDelta, ToolChoice, ToolSpec};
use crate::config::ResolvedProvider;
use crate::error::{DocentError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    CreateChatCompletionStreamResponse, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat model backed by the OpenAI chat completions API (or a compatible endpoint).
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAIChatModel {
    /// Create a model from an existing client.
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: 0.5,
            max_tokens: None,
        }
    }

    /// Create a model for a resolved provider.
    pub fn from_provider(provider: &ResolvedProvider, timeout: Duration) -> Result<Self> {
        let client = create_client_with_timeout(
            &provider.api_key,
            provider.api_base.as_deref(),
            timeout,
        )?;
        Ok(Self::new(client, &provider.model))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request(&self, request: ChatRequest) -> Result<CreateChatCompletionRequest> {
        let messages = request
            .messages
            .iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .n(1);

        if let Some(max_tokens) = self.max_tokens {
            builder.max_tokens(max_tokens);
        }

        if !request.tools.is_empty() {
            builder
                .tools(request.tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(match request.tool_choice {
                    ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
                    ToolChoice::Required => ChatCompletionToolChoiceOption::Required,
                    ToolChoice::None => ChatCompletionToolChoiceOption::None,
                });
        }

        builder.build().map_err(|e| DocentError::Model(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let request = self.build_request(request)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            DocentError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| DocentError::Model("Empty response from LLM".to_string()))?
            .clone();

        Ok(answer)
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream> {
        let request = self.build_request(request)?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| DocentError::OpenAI(format!("Failed to start stream: {}", e)))?;

        debug!("Opened completion stream");

        let deltas = stream
            .map(|item| match item {
                Ok(response) => response_deltas(response)
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(DocentError::OpenAI(format!("Stream error: {}", e)))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(deltas))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Split a streamed response chunk into content and tool-call fragments.
fn response_deltas(response: CreateChatCompletionStreamResponse) -> Vec<ModelDelta> {
    let mut deltas = Vec::new();

    for choice in response.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                deltas.push(ModelDelta::Content(content));
            }
        }

        for chunk in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match chunk.function {
                Some(function) => (function.name, function.arguments),
                None => (None, None),
            };
            deltas.push(ModelDelta::ToolCall {
                index: chunk.index,
                id: chunk.id,
                name,
                arguments,
            });
        }
    }

    deltas
}

fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let message: ChatCompletionRequestMessage = match message {
        ChatMessage::System { content } => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(|e| DocentError::Model(e.to_string()))?
            .into(),
        ChatMessage::User { content } => ChatCompletionRequestUserMessageArgs::default()
            .content(content.clone())
            .build()
            .map_err(|e| DocentError::Model(e.to_string()))?
            .into(),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = content {
                builder.content(content.clone());
            }
            if !tool_calls.is_empty() {
                builder.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            builder
                .build()
                .map_err(|e| DocentError::Model(e.to_string()))?
                .into()
        }
        ChatMessage::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.clone())
            .content(content.clone())
            .build()
            .map_err(|e| DocentError::Model(e.to_string()))?
            .into(),
    };

    Ok(message)
}

fn to_openai_tool(tool: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: tool.name.clone(),
            description: Some(tool.description.clone()),
            parameters: Some(tool.parameters.clone()),
            strict: None,
        },
    }
}
